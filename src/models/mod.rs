//! Data models for the application

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Student,
    Manager,
    Admin,
}

impl UserRole {
    /// Managers and admins share the staff-facing operations
    pub fn is_staff(self) -> bool {
        matches!(self, UserRole::Manager | UserRole::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "academic_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AcademicStatus {
    Studying,
    OnLeave,
    Graduated,
    Expelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gender", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "room_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Standard,
    Vip,
    Deluxe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "room_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
}

impl RoomStatus {
    /// Status derived from occupancy: occupied iff the room is full.
    /// Maintenance is a manual override and is never produced here.
    pub fn from_occupancy(occupancy: i32, capacity: i32) -> Self {
        if occupancy >= capacity {
            RoomStatus::Occupied
        } else {
            RoomStatus::Available
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "contract_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    Expired,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    RoomRent,
    Electricity,
    Water,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Maintenance,
    Complaint,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Completed,
    Rejected,
}

impl RequestStatus {
    /// pending -> in_progress -> completed, or pending -> rejected.
    /// completed and rejected are terminal; in_progress cannot be rejected.
    pub fn can_transition(self, to: RequestStatus) -> bool {
        matches!(
            (self, to),
            (RequestStatus::Pending, RequestStatus::InProgress)
                | (RequestStatus::Pending, RequestStatus::Rejected)
                | (RequestStatus::InProgress, RequestStatus::Completed)
        )
    }
}

// =============================================================================
// User
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone_number: String,
    pub role: UserRole,
    pub student_id: Option<String>,
    pub class_name: Option<String>,
    pub faculty: Option<String>,
    pub major: Option<String>,
    pub course: Option<String>,
    pub academic_status: Option<AcademicStatus>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub id_card: Option<String>,
    pub id_card_front_image: Option<String>,
    pub id_card_back_image: Option<String>,
    pub avatar: Option<String>,
    pub place_of_origin: Option<String>,
    pub current_address: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User as exposed over the API: no credential hash, no id-card scans
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone_number: String,
    pub role: UserRole,
    pub student_id: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub faculty: Option<String>,
    pub major: Option<String>,
    pub course: Option<String>,
    pub academic_status: Option<AcademicStatus>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub id_card: Option<String>,
    pub avatar: Option<String>,
    pub place_of_origin: Option<String>,
    pub current_address: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relation: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            phone_number: user.phone_number,
            role: user.role,
            student_id: user.student_id,
            class_name: user.class_name,
            faculty: user.faculty,
            major: user.major,
            course: user.course,
            academic_status: user.academic_status,
            date_of_birth: user.date_of_birth,
            gender: user.gender,
            id_card: user.id_card,
            avatar: user.avatar,
            place_of_origin: user.place_of_origin,
            current_address: user.current_address,
            emergency_contact_name: user.emergency_contact_name,
            emergency_contact_phone: user.emergency_contact_phone,
            emergency_contact_relation: user.emergency_contact_relation,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: String,
    pub phone_number: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub student_id: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub faculty: String,
    pub major: String,
    pub course: String,
    pub id_card: String,
    pub place_of_origin: Option<String>,
    pub current_address: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relation: Option<String>,
    /// Portrait photo as a base64 data URL
    pub avatar_image: String,
    /// Front side of the national id card as a base64 data URL
    pub id_card_front_image: String,
    /// Back side of the national id card as a base64 data URL
    pub id_card_back_image: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfile {
    pub phone_number: Option<String>,
    pub current_address: Option<String>,
    pub avatar: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone_number: String,
    pub role: UserRole,
    pub student_id: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub faculty: Option<String>,
    pub major: Option<String>,
    pub course: Option<String>,
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// =============================================================================
// Room
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: Uuid,
    pub room_number: String,
    pub building: String,
    pub floor: i32,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub capacity: i32,
    pub current_occupancy: i32,
    pub price_per_semester: i64,
    pub amenities: Vec<String>,
    pub status: RoomStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoom {
    pub room_number: String,
    pub building: String,
    pub floor: i32,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub capacity: i32,
    pub price_per_semester: i64,
    #[serde(default)]
    pub amenities: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoom {
    pub room_number: Option<String>,
    pub building: Option<String>,
    pub floor: Option<i32>,
    #[serde(rename = "type")]
    pub room_type: Option<RoomType>,
    pub capacity: Option<i32>,
    pub price_per_semester: Option<i64>,
    pub amenities: Option<Vec<String>>,
    pub status: Option<RoomStatus>,
}

// =============================================================================
// Application
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub semester: String,
    pub academic_year: String,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateApplication {
    pub room_id: Uuid,
    pub semester: String,
    pub academic_year: String,
}

// =============================================================================
// Contract
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contract {
    pub id: Uuid,
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ContractStatus,
    pub monthly_rent: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateContract {
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_rent: i64,
}

// =============================================================================
// Invoice
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub contract_id: Uuid,
    pub amount: i64,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    #[serde(rename = "type")]
    pub invoice_type: InvoiceType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoice {
    pub contract_id: Uuid,
    pub amount: i64,
    pub due_date: NaiveDate,
    #[serde(rename = "type")]
    pub invoice_type: InvoiceType,
}

// =============================================================================
// Maintenance / complaint request
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MaintenanceRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub room_id: Uuid,
    #[serde(rename = "type")]
    pub request_type: RequestType,
    pub title: String,
    pub description: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequest {
    pub room_id: Uuid,
    #[serde(rename = "type")]
    pub request_type: RequestType,
    pub title: String,
    pub description: String,
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_students: i64,
    pub total_rooms: i64,
    pub available_rooms: i64,
    pub occupied_rooms: i64,
    pub maintenance_rooms: i64,
    pub pending_applications: i64,
    pub pending_requests: i64,
    pub overdue_invoices: i64,
    pub collected_revenue: i64,
}

// =============================================================================
// API Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_status_below_capacity() {
        assert_eq!(RoomStatus::from_occupancy(0, 6), RoomStatus::Available);
        assert_eq!(RoomStatus::from_occupancy(5, 6), RoomStatus::Available);
    }

    #[test]
    fn test_room_status_at_capacity() {
        assert_eq!(RoomStatus::from_occupancy(6, 6), RoomStatus::Occupied);
        // Overfull rooms still read as occupied
        assert_eq!(RoomStatus::from_occupancy(7, 6), RoomStatus::Occupied);
    }

    #[test]
    fn test_request_transitions_allowed() {
        assert!(RequestStatus::Pending.can_transition(RequestStatus::InProgress));
        assert!(RequestStatus::Pending.can_transition(RequestStatus::Rejected));
        assert!(RequestStatus::InProgress.can_transition(RequestStatus::Completed));
    }

    #[test]
    fn test_request_transitions_rejected() {
        // in_progress has no rejection path
        assert!(!RequestStatus::InProgress.can_transition(RequestStatus::Rejected));
        // terminal states stay terminal
        assert!(!RequestStatus::Completed.can_transition(RequestStatus::InProgress));
        assert!(!RequestStatus::Rejected.can_transition(RequestStatus::Pending));
        // no self transitions
        assert!(!RequestStatus::Pending.can_transition(RequestStatus::Pending));
        // no skipping straight to completed
        assert!(!RequestStatus::Pending.can_transition(RequestStatus::Completed));
    }

    #[test]
    fn test_staff_roles() {
        assert!(UserRole::Manager.is_staff());
        assert!(UserRole::Admin.is_staff());
        assert!(!UserRole::Student.is_staff());
    }
}
