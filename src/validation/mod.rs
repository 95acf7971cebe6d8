//! Input validation module

use crate::models::{CreateRequest, CreateRoom, RegisterRequest};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Datelike, NaiveDate};
use thiserror::Error;

/// Minimum password length for registration and password changes
pub const MIN_PASSWORD_LEN: usize = 6;

/// Students must be between these ages (by birth year)
pub const MIN_STUDENT_AGE: i32 = 18;
pub const MAX_STUDENT_AGE: i32 = 30;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' is too long (max {max} characters)")]
    TooLong { field: String, max: usize },

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Email must belong to an institutional domain")]
    EmailDomainNotAllowed,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Password confirmation does not match")]
    PasswordMismatch,

    #[error("Invalid phone number (10 digits, starting with 0)")]
    InvalidPhoneNumber,

    #[error("Students must be between {min} and {max} years old")]
    AgeOutOfRange { min: i32, max: i32 },

    #[error("Invalid student id (must be 10 digits)")]
    InvalidStudentId,

    #[error("Invalid national id (must be 9 or 12 digits)")]
    InvalidNationalId,

    #[error("Field '{field}' is not a valid base64 image data URL")]
    InvalidImageData { field: String },

    #[error("Image '{field}' is too large (max {max_mb} MB)")]
    ImageTooLarge { field: String, max_mb: usize },

    #[error("Field '{field}' is not an image")]
    NotAnImage { field: String },

    #[error("Room capacity must be at least 1")]
    InvalidCapacity,

    #[error("Price must be positive")]
    InvalidPrice,
}

/// Validate a student self-registration request.
///
/// Uniqueness of email and student id is checked against the database by
/// the handler; everything here is derivable from the field values alone.
pub fn validate_registration(
    input: &RegisterRequest,
    allowed_domains: &[String],
    max_image_bytes: usize,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    require(&input.full_name, "full_name")?;
    if input.full_name.len() > 255 {
        return Err(ValidationError::TooLong {
            field: "full_name".to_string(),
            max: 255,
        });
    }

    if !is_valid_email(&input.email) {
        return Err(ValidationError::InvalidEmail);
    }
    if !is_institutional_email(&input.email, allowed_domains) {
        return Err(ValidationError::EmailDomainNotAllowed);
    }

    validate_password(&input.password, &input.confirm_password)?;
    validate_phone_number(&input.phone_number)?;
    validate_birth_year(input.date_of_birth, today)?;

    require(&input.class_name, "class")?;
    require(&input.faculty, "faculty")?;
    require(&input.major, "major")?;
    require(&input.course, "course")?;

    validate_student_id(&input.student_id)?;
    validate_national_id(&input.id_card)?;

    validate_image_data(&input.avatar_image, "avatar_image", max_image_bytes)?;
    validate_image_data(
        &input.id_card_front_image,
        "id_card_front_image",
        max_image_bytes,
    )?;
    validate_image_data(
        &input.id_card_back_image,
        "id_card_back_image",
        max_image_bytes,
    )?;

    Ok(())
}

/// Password length and confirmation check, shared by registration,
/// password change, and admin user creation
pub fn validate_password(password: &str, confirm: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    if password != confirm {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

/// Phone numbers are 10 digits with a leading 0
pub fn validate_phone_number(phone: &str) -> Result<(), ValidationError> {
    let valid = phone.len() == 10
        && phone.starts_with('0')
        && phone.chars().all(|c| c.is_ascii_digit());
    if !valid {
        return Err(ValidationError::InvalidPhoneNumber);
    }
    Ok(())
}

/// Age is computed from calendar years only, not full birthdays
pub fn validate_birth_year(date_of_birth: NaiveDate, today: NaiveDate) -> Result<(), ValidationError> {
    let age = today.year() - date_of_birth.year();
    if !(MIN_STUDENT_AGE..=MAX_STUDENT_AGE).contains(&age) {
        return Err(ValidationError::AgeOutOfRange {
            min: MIN_STUDENT_AGE,
            max: MAX_STUDENT_AGE,
        });
    }
    Ok(())
}

/// Student ids are exactly 10 digits
pub fn validate_student_id(student_id: &str) -> Result<(), ValidationError> {
    if student_id.len() != 10 || !student_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidStudentId);
    }
    Ok(())
}

/// National ids are 9 digits (old format) or 12 digits (new format)
pub fn validate_national_id(id_card: &str) -> Result<(), ValidationError> {
    let digits = id_card.chars().all(|c| c.is_ascii_digit());
    if !digits || (id_card.len() != 9 && id_card.len() != 12) {
        return Err(ValidationError::InvalidNationalId);
    }
    Ok(())
}

/// Validate an uploaded image sent as a `data:<mime>;base64,<payload>` URL.
///
/// The decoded bytes are size-checked and sniffed by magic bytes, so a
/// renamed non-image payload is rejected regardless of the declared mime.
pub fn validate_image_data(
    data_url: &str,
    field: &str,
    max_bytes: usize,
) -> Result<(), ValidationError> {
    if data_url.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    let payload = data_url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, payload)| payload)
        .ok_or_else(|| ValidationError::InvalidImageData {
            field: field.to_string(),
        })?;

    let bytes = BASE64
        .decode(payload)
        .map_err(|_| ValidationError::InvalidImageData {
            field: field.to_string(),
        })?;

    if bytes.len() > max_bytes {
        return Err(ValidationError::ImageTooLarge {
            field: field.to_string(),
            max_mb: max_bytes / (1024 * 1024),
        });
    }

    if !infer::is_image(&bytes) {
        return Err(ValidationError::NotAnImage {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validate a room creation request
pub fn validate_create_room(input: &CreateRoom) -> Result<(), ValidationError> {
    require(&input.room_number, "room_number")?;
    require(&input.building, "building")?;
    if input.capacity < 1 {
        return Err(ValidationError::InvalidCapacity);
    }
    if input.price_per_semester <= 0 {
        return Err(ValidationError::InvalidPrice);
    }
    Ok(())
}

/// Validate a maintenance/complaint request creation
pub fn validate_create_request(input: &CreateRequest) -> Result<(), ValidationError> {
    require(&input.title, "title")?;
    if input.title.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "title".to_string(),
            max: 200,
        });
    }
    require(&input.description, "description")?;
    if input.description.len() > 2000 {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: 2000,
        });
    }
    Ok(())
}

fn require(value: &str, field: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Simple email validation
fn is_valid_email(email: &str) -> bool {
    // Basic check: one @ with a dotted domain
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);

    !local.is_empty() && !domain.is_empty() && domain.contains('.') && domain.len() > 2
}

/// Check the email suffix against the configured institutional domains
fn is_institutional_email(email: &str, allowed_domains: &[String]) -> bool {
    allowed_domains
        .iter()
        .any(|domain| email.ends_with(&format!("@{}", domain)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, RequestType, RoomType};
    use uuid::Uuid;

    const DOMAINS: &[&str] = &["vanlanguni.vn", "vlu.edu.vn"];

    fn domains() -> Vec<String> {
        DOMAINS.iter().map(|d| d.to_string()).collect()
    }

    // A 1x1 transparent PNG, small enough to inline
    const TINY_PNG_B64: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn tiny_png_data_url() -> String {
        format!("data:image/png;base64,{}", TINY_PNG_B64)
    }

    fn valid_registration() -> RegisterRequest {
        RegisterRequest {
            email: "2115000009@vanlanguni.vn".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
            full_name: "Tran Thi Sinh Vien".to_string(),
            phone_number: "0369852147".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2003, 5, 15).unwrap(),
            gender: Gender::Female,
            student_id: "2115000009".to_string(),
            class_name: "DHTI15A1HN".to_string(),
            faculty: "Information Technology".to_string(),
            major: "Software Engineering".to_string(),
            course: "K21".to_string(),
            id_card: "001203012345".to_string(),
            place_of_origin: None,
            current_address: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            emergency_contact_relation: None,
            avatar_image: tiny_png_data_url(),
            id_card_front_image: tiny_png_data_url(),
            id_card_back_image: tiny_png_data_url(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()
    }

    #[test]
    fn test_valid_registration() {
        let input = valid_registration();
        assert!(validate_registration(&input, &domains(), 5 * 1024 * 1024, today()).is_ok());
    }

    #[test]
    fn test_registration_wrong_domain() {
        let mut input = valid_registration();
        input.email = "someone@gmail.com".to_string();
        assert!(matches!(
            validate_registration(&input, &domains(), 5 * 1024 * 1024, today()),
            Err(ValidationError::EmailDomainNotAllowed)
        ));
    }

    #[test]
    fn test_registration_malformed_email() {
        let mut input = valid_registration();
        input.email = "not-an-email".to_string();
        assert!(matches!(
            validate_registration(&input, &domains(), 5 * 1024 * 1024, today()),
            Err(ValidationError::InvalidEmail)
        ));
    }

    #[test]
    fn test_password_too_short() {
        assert!(matches!(
            validate_password("abc", "abc"),
            Err(ValidationError::PasswordTooShort { min: 6 })
        ));
    }

    #[test]
    fn test_password_mismatch() {
        assert!(matches!(
            validate_password("secret1", "secret2"),
            Err(ValidationError::PasswordMismatch)
        ));
    }

    #[test]
    fn test_phone_number() {
        assert!(validate_phone_number("0369852147").is_ok());
        // must start with 0
        assert!(validate_phone_number("1369852147").is_err());
        // must be exactly 10 digits
        assert!(validate_phone_number("036985214").is_err());
        assert!(validate_phone_number("03698521478").is_err());
        assert!(validate_phone_number("03698x2147").is_err());
    }

    #[test]
    fn test_birth_year_range() {
        let today = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        // 21 years by calendar year
        assert!(validate_birth_year(NaiveDate::from_ymd_opt(2003, 12, 31).unwrap(), today).is_ok());
        // boundary ages count, regardless of month
        assert!(validate_birth_year(NaiveDate::from_ymd_opt(2006, 1, 1).unwrap(), today).is_ok());
        assert!(validate_birth_year(NaiveDate::from_ymd_opt(1994, 6, 1).unwrap(), today).is_ok());
        // 17 and 31 are out
        assert!(validate_birth_year(NaiveDate::from_ymd_opt(2007, 1, 1).unwrap(), today).is_err());
        assert!(validate_birth_year(NaiveDate::from_ymd_opt(1993, 12, 31).unwrap(), today).is_err());
    }

    #[test]
    fn test_student_id() {
        assert!(validate_student_id("2115000001").is_ok());
        assert!(validate_student_id("211500000").is_err());
        assert!(validate_student_id("21150000012").is_err());
        assert!(validate_student_id("21150000ab").is_err());
    }

    #[test]
    fn test_national_id() {
        // old 9-digit and new 12-digit formats
        assert!(validate_national_id("123456789").is_ok());
        assert!(validate_national_id("001203012345").is_ok());
        assert!(validate_national_id("1234567890").is_err());
        assert!(validate_national_id("00120301234a").is_err());
    }

    #[test]
    fn test_image_data_valid() {
        assert!(validate_image_data(&tiny_png_data_url(), "avatar_image", 1024).is_ok());
    }

    #[test]
    fn test_image_data_missing() {
        assert!(matches!(
            validate_image_data("  ", "avatar_image", 1024),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_image_data_not_a_data_url() {
        assert!(matches!(
            validate_image_data("plain base64 here", "avatar_image", 1024),
            Err(ValidationError::InvalidImageData { .. })
        ));
    }

    #[test]
    fn test_image_data_too_large() {
        assert!(matches!(
            validate_image_data(&tiny_png_data_url(), "avatar_image", 8),
            Err(ValidationError::ImageTooLarge { .. })
        ));
    }

    #[test]
    fn test_image_data_not_an_image() {
        let data_url = format!("data:text/plain;base64,{}", BASE64.encode(b"hello world"));
        assert!(matches!(
            validate_image_data(&data_url, "id_card_front_image", 1024),
            Err(ValidationError::NotAnImage { .. })
        ));
    }

    #[test]
    fn test_create_room_valid() {
        let input = CreateRoom {
            room_number: "A101".to_string(),
            building: "A".to_string(),
            floor: 1,
            room_type: RoomType::Standard,
            capacity: 6,
            price_per_semester: 2_000_000,
            amenities: vec!["Bed".to_string(), "Desk".to_string()],
        };
        assert!(validate_create_room(&input).is_ok());
    }

    #[test]
    fn test_create_room_invalid() {
        let mut input = CreateRoom {
            room_number: "".to_string(),
            building: "A".to_string(),
            floor: 1,
            room_type: RoomType::Standard,
            capacity: 6,
            price_per_semester: 2_000_000,
            amenities: vec![],
        };
        assert!(matches!(
            validate_create_room(&input),
            Err(ValidationError::Required { .. })
        ));

        input.room_number = "A101".to_string();
        input.capacity = 0;
        assert!(matches!(
            validate_create_room(&input),
            Err(ValidationError::InvalidCapacity)
        ));

        input.capacity = 6;
        input.price_per_semester = 0;
        assert!(matches!(
            validate_create_room(&input),
            Err(ValidationError::InvalidPrice)
        ));
    }

    #[test]
    fn test_create_request_validation() {
        let input = CreateRequest {
            room_id: Uuid::new_v4(),
            request_type: RequestType::Maintenance,
            title: "Ceiling fan not working".to_string(),
            description: "The fan in room A101 does not spin".to_string(),
        };
        assert!(validate_create_request(&input).is_ok());

        let empty_title = CreateRequest {
            title: " ".to_string(),
            ..input.clone()
        };
        assert!(matches!(
            validate_create_request(&empty_title),
            Err(ValidationError::Required { .. })
        ));

        let long_title = CreateRequest {
            title: "x".repeat(201),
            ..input
        };
        assert!(matches!(
            validate_create_request(&long_title),
            Err(ValidationError::TooLong { .. })
        ));
    }
}
