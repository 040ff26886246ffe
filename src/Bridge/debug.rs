use super::messenger::Messenger;
use std::fmt;

// Debug proxy implementations that call the standalone debug functions
impl fmt::Debug for Messenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_messenger(self, f)
    }
}
