//! Input validation
//!
//! Everything here runs before the first network call.

use crate::ledger::{AccountAddress, AssetId};

use super::types::{AssetSubmission, ValidationError};

/// Check a registration request against the upload rules
pub fn validate_submission(submission: &AssetSubmission, max_file_size: u64) -> Result<(), ValidationError> {
    require_text("name", &submission.name)?;
    require_text("description", &submission.description)?;

    // Media types are case-insensitive
    if !submission.content_type.to_ascii_lowercase().starts_with("image/") {
        return Err(ValidationError::InvalidFileType(submission.content_type.clone()));
    }

    match submission.content.len_hint() {
        Some(0) => return Err(ValidationError::MissingField("file")),
        Some(size) if size > max_file_size => {
            return Err(ValidationError::FileTooLarge {
                size,
                max: max_file_size,
            })
        }
        _ => {}
    }

    Ok(())
}

/// Check that a required text field is present and non-blank
pub fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// Parse a transfer target (`0x` + 40 hex digits)
pub fn parse_transfer_target(value: &str) -> Result<AccountAddress, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField("newOwner"));
    }
    Ok(AccountAddress::parse(value)?)
}

/// Parse an asset id as entered by a user
pub fn parse_asset_id(value: &str) -> Result<AssetId, ValidationError> {
    value
        .parse()
        .map_err(|_| ValidationError::InvalidAssetId(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::AssetContent;

    fn submission(content_type: &str, size: usize) -> AssetSubmission {
        AssetSubmission {
            name: "Cosmic Horizon".to_string(),
            description: "Artwork".to_string(),
            file_name: "horizon.png".to_string(),
            content_type: content_type.to_string(),
            content: AssetContent::Bytes(vec![0u8; size]),
        }
    }

    #[test]
    fn test_valid_submission() {
        assert!(validate_submission(&submission("image/png", 100), 1024).is_ok());
    }

    #[test]
    fn test_image_type_ignores_case() {
        assert!(validate_submission(&submission("IMAGE/PNG", 100), 1024).is_ok());
        assert!(validate_submission(&submission("Image/Jpeg", 100), 1024).is_ok());
        assert!(matches!(
            validate_submission(&submission("TEXT/PLAIN", 100), 1024),
            Err(ValidationError::InvalidFileType(_))
        ));
    }

    #[test]
    fn test_rejects_non_image() {
        assert!(matches!(
            validate_submission(&submission("application/pdf", 100), 1024),
            Err(ValidationError::InvalidFileType(_))
        ));
    }

    #[test]
    fn test_rejects_oversized() {
        assert!(matches!(
            validate_submission(&submission("image/png", 2048), 1024),
            Err(ValidationError::FileTooLarge { size: 2048, max: 1024 })
        ));
    }

    #[test]
    fn test_rejects_blank_fields() {
        let mut s = submission("image/png", 10);
        s.description = "   ".to_string();
        assert!(matches!(
            validate_submission(&s, 1024),
            Err(ValidationError::MissingField("description"))
        ));

        assert!(matches!(
            validate_submission(&submission("image/png", 0), 1024),
            Err(ValidationError::MissingField("file"))
        ));
    }

    #[test]
    fn test_transfer_target() {
        assert!(matches!(
            parse_transfer_target("not-an-address"),
            Err(ValidationError::InvalidAddress(_))
        ));
        assert!(matches!(
            parse_transfer_target(""),
            Err(ValidationError::MissingField("newOwner"))
        ));
        assert!(parse_transfer_target(&format!("0x{}", "a".repeat(40))).is_ok());
    }

    #[test]
    fn test_asset_id() {
        assert_eq!(parse_asset_id(" 42 ").unwrap(), AssetId(42));
        assert!(parse_asset_id("abc").is_err());
        assert!(parse_asset_id("-1").is_err());
    }
}
