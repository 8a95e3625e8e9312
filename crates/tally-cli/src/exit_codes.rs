//! Process exit codes.
//!
//! Library errors carry their own codes; anything else (bad flags, unreadable
//! config or snapshot) is a configuration error.

use tally_sync::{ExportError, VerifyError};

pub const SUCCESS: i32 = 0;
pub const CONFIG_ERROR: i32 = 2;

pub fn for_error(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<ExportError>() {
        return e.exit_code();
    }
    if let Some(e) = err.downcast_ref::<VerifyError>() {
        return e.exit_code();
    }
    CONFIG_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn typed_errors_keep_their_codes_through_context() {
        let dirty: anyhow::Result<()> = Err(ExportError::DirtyEntitlement { id: "e".into() }.into());
        let err = dirty.context("export failed").unwrap_err();
        assert_eq!(for_error(&err), 3);

        let bad_sig = anyhow::Error::new(VerifyError::SignatureInvalid);
        assert_eq!(for_error(&bad_sig), 4);
    }

    #[test]
    fn other_errors_are_config_errors() {
        assert_eq!(for_error(&anyhow::anyhow!("no such file")), CONFIG_ERROR);
    }
}
