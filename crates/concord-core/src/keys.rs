//! Key conventions shared by session adapters.
//!
//! Room state is keyed by canonical user-facing keys. A session exposes more
//! keys than that: private keys that must never leave the session, framework
//! bookkeeping, form submit buttons, and generated control ids that alias a
//! user key. This module knows how to tell them apart.
//!
//! Generated control ids have the shape
//!
//! ```text
//! $$GENERATED_WIDGET_KEY-<32 lowercase hex>-<user key>
//! ```
//!
//! where a user key of `None` marks a control the user never named.

use thiserror::Error;

/// Marker for keys that are explicitly private to a session.
pub const NOT_SYNCED_PREFIX: &str = "$NOT_SYNCED$";

/// Marker for framework bookkeeping keys.
pub const INTERNAL_KEY_PREFIX: &str = "$$INTERNAL";

/// Prefix of generated control identifiers.
pub const GENERATED_CONTROL_ID_PREFIX: &str = "$$GENERATED_WIDGET_KEY";

/// Session-local key holding the last synchronized room timestamp.
pub const LAST_SYNCED_KEY: &str = "$NOT_SYNCED$_$LAST_SYNCED$";

/// Session-local key holding the current room name.
pub const ROOM_NAME_KEY: &str = "$NOT_SYNCED$_$ROOM_NAME$";

/// Hex digits in the hash segment of a generated control id.
const CONTROL_HASH_LEN: usize = 32;

/// Suffix of a generated control id without a user key.
const UNKEYED_SUFFIX: &str = "-None";

/// Key-format contract violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// A keyed control id does not have the expected shape.
    #[error("malformed control id {id:?}: control id scheme changed")]
    MalformedControlId {
        /// The offending identifier.
        id: String,
    },
}

/// Return a key that is explicitly never synchronized.
pub fn not_synced_key(user_key: &str) -> String {
    format!("{NOT_SYNCED_PREFIX}_{user_key}")
}

/// Whether a key may leave the session.
pub fn is_synced(key: &str) -> bool {
    !key.contains(NOT_SYNCED_PREFIX) && !key.contains(INTERNAL_KEY_PREFIX)
}

/// Whether a key is a form submit button, e.g. `FormSubmitter:my_form-Submit`.
pub fn is_form_submitter(key: &str) -> bool {
    key.contains("FormSubmitter") && key.contains("-Submit")
}

/// Whether a key is a generated control id.
pub fn is_control_id(key: &str) -> bool {
    key.starts_with(GENERATED_CONTROL_ID_PREFIX)
}

/// Whether a key is a generated control id carrying a user key.
pub fn is_keyed_control_id(key: &str) -> bool {
    is_control_id(key) && !key.ends_with(UNKEYED_SUFFIX)
}

/// Build a generated control id from a hash and an optional user key.
pub fn control_id(hash: u128, user_key: Option<&str>) -> String {
    format!("{GENERATED_CONTROL_ID_PREFIX}-{hash:032x}-{}", user_key.unwrap_or("None"))
}

/// Collapse a control id to the user key it aliases.
///
/// Plain keys and unkeyed control ids are returned unchanged.
///
/// # Errors
///
/// Returns `KeyError::MalformedControlId` if `id` claims to be a keyed
/// control id but does not match the expected shape. Guessing here could map
/// two controls onto one room key without anyone noticing.
pub fn control_id_to_user_key(id: &str) -> Result<&str, KeyError> {
    if !is_keyed_control_id(id) {
        return Ok(id);
    }

    let malformed = || KeyError::MalformedControlId { id: id.to_owned() };

    let rest = id
        .strip_prefix(GENERATED_CONTROL_ID_PREFIX)
        .and_then(|rest| rest.strip_prefix('-'))
        .ok_or_else(malformed)?;
    let (hash, tail) = rest.split_at_checked(CONTROL_HASH_LEN).ok_or_else(malformed)?;
    if !hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(malformed());
    }

    tail.strip_prefix('-').ok_or_else(malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synced_keys() {
        assert!(is_synced("custom_user_key"));
        assert!(!is_synced("$NOT_SYNCED$_custom_user_key"));
        assert!(!is_synced("$$INTERNAL_counter"));

        assert!(!is_synced(LAST_SYNCED_KEY));
        assert!(!is_synced(ROOM_NAME_KEY));
    }

    #[test]
    fn not_synced_key_format() {
        assert_eq!(not_synced_key("custom_user_key"), "$NOT_SYNCED$_custom_user_key");
        assert_eq!(not_synced_key("$LAST_SYNCED$"), LAST_SYNCED_KEY);
        assert_eq!(not_synced_key("$ROOM_NAME$"), ROOM_NAME_KEY);
    }

    #[test]
    fn form_submitter_keys() {
        assert!(is_form_submitter("FormSubmitter:my_form-Submit"));
        assert!(is_form_submitter("FormSubmitter:customkey-Submit"));
        assert!(!is_form_submitter("customkey"));
    }

    #[test]
    fn plain_key_normalizes_to_itself() {
        assert_eq!(control_id_to_user_key("not_keyed"), Ok("not_keyed"));
    }

    #[test]
    fn keyed_control_id_normalizes_to_user_key() {
        let id = "$$GENERATED_WIDGET_KEY-a57f8cd0ef6469c61f435e5eb8097cf7-customkey";
        assert_eq!(control_id_to_user_key(id), Ok("customkey"));
    }

    #[test]
    fn user_key_may_contain_dashes() {
        let id = control_id(7, Some("my-slider-2"));
        assert_eq!(control_id_to_user_key(&id), Ok("my-slider-2"));
    }

    #[test]
    fn unkeyed_control_id_is_kept() {
        let id = control_id(0xabc, None);
        assert!(is_control_id(&id));
        assert!(!is_keyed_control_id(&id));
        assert_eq!(control_id_to_user_key(&id), Ok(id.as_str()));
    }

    #[test]
    fn malformed_control_ids_are_rejected() {
        for id in [
            "$$GENERATED_WIDGET_KEY_with_wrong_format",
            "$$GENERATED_WIDGET_KEY-short-key",
            "$$GENERATED_WIDGET_KEY-A57F8CD0EF6469C61F435E5EB8097CF7-key",
            "$$GENERATED_WIDGET_KEY-a57f8cd0ef6469c61f435e5eb8097cf7key",
        ] {
            assert_eq!(
                control_id_to_user_key(id),
                Err(KeyError::MalformedControlId { id: id.to_owned() }),
                "{id} should be rejected"
            );
        }
    }
}
