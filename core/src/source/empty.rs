use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::reporter::ResultHandler;

///
/// A no-op source, used only in tests: `trigger` reports nothing and always succeeds.
///
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptySource {}

impl EmptySource {
    pub fn trigger(&self, _reporter: &dyn ResultHandler) -> Result<(), FetchError> {
        Ok(())
    }
}
