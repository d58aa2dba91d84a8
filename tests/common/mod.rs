//! Learning-platform records shared by the integration tests

#![allow(dead_code)]

use avro_event_bridge::{
    AvroBridge, AvroRecord, BridgeConfig, CourseKey, Datum, ExtensionRegistry, FieldType,
    RecordInstance, RecordType, Result,
};
use chrono::{DateTime, TimeZone, Utc};

/// Route bridge logs to the test harness; `RUST_LOG=avro_event_bridge=trace` to see them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserPersonalData {
    pub username: String,
    pub email: String,
    pub name: String,
}

impl AvroRecord for UserPersonalData {
    fn record_type() -> RecordType {
        RecordType::new("UserPersonalData")
            .field("username", FieldType::of::<String>())
            .field("email", FieldType::of::<String>())
            .field_with_default("name", FieldType::of::<String>(), "")
    }

    fn to_instance(&self) -> RecordInstance {
        RecordInstance::new("UserPersonalData")
            .with("username", self.username.clone())
            .with("email", self.email.clone())
            .with("name", self.name.clone())
    }

    fn from_instance(mut instance: RecordInstance) -> Result<Self> {
        Ok(Self {
            username: instance.take("username")?,
            email: instance.take("email")?,
            name: instance.take("name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserData {
    pub id: i64,
    pub is_active: bool,
    pub pii: UserPersonalData,
}

impl AvroRecord for UserData {
    fn record_type() -> RecordType {
        RecordType::new("UserData")
            .field("id", FieldType::of::<i64>())
            .field("is_active", FieldType::of::<bool>())
            .field("pii", FieldType::record::<UserPersonalData>())
    }

    fn to_instance(&self) -> RecordInstance {
        RecordInstance::new("UserData")
            .with("id", self.id)
            .with("is_active", self.is_active)
            .with("pii", Datum::record(&self.pii))
    }

    fn from_instance(mut instance: RecordInstance) -> Result<Self> {
        Ok(Self {
            id: instance.take("id")?,
            is_active: instance.take("is_active")?,
            pii: instance.take_record("pii")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseData {
    pub course_key: CourseKey,
    pub display_name: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl AvroRecord for CourseData {
    fn record_type() -> RecordType {
        RecordType::new("CourseData")
            .field("course_key", FieldType::of::<CourseKey>())
            .field_with_default("display_name", FieldType::of::<String>(), "")
            .optional_field("start", FieldType::of::<DateTime<Utc>>())
            .optional_field("end", FieldType::of::<DateTime<Utc>>())
    }

    fn to_instance(&self) -> RecordInstance {
        RecordInstance::new("CourseData")
            .with("course_key", self.course_key.clone())
            .with("display_name", self.display_name.clone())
            .with("start", self.start)
            .with("end", self.end)
    }

    fn from_instance(mut instance: RecordInstance) -> Result<Self> {
        Ok(Self {
            course_key: instance.take("course_key")?,
            display_name: instance.take("display_name")?,
            start: instance.take("start")?,
            end: instance.take("end")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseEnrollmentData {
    pub user: UserData,
    pub course: CourseData,
    pub mode: String,
    pub is_active: bool,
    pub creation_date: DateTime<Utc>,
    pub created_by: Option<UserData>,
}

impl AvroRecord for CourseEnrollmentData {
    fn record_type() -> RecordType {
        enrollment_fields(RecordType::new("CourseEnrollmentData"))
            .optional_field("created_by", FieldType::record::<UserData>())
    }

    fn to_instance(&self) -> RecordInstance {
        RecordInstance::new("CourseEnrollmentData")
            .with("user", Datum::record(&self.user))
            .with("course", Datum::record(&self.course))
            .with("mode", self.mode.clone())
            .with("is_active", self.is_active)
            .with("creation_date", self.creation_date)
            .with("created_by", self.created_by.as_ref().map(Datum::record))
    }

    fn from_instance(mut instance: RecordInstance) -> Result<Self> {
        Ok(Self {
            user: instance.take_record("user")?,
            course: instance.take_record("course")?,
            mode: instance.take("mode")?,
            is_active: instance.take("is_active")?,
            creation_date: instance.take("creation_date")?,
            created_by: instance.take_optional_record("created_by")?,
        })
    }
}

/// The required enrollment fields, shared with evolved variants in tests
pub fn enrollment_fields(record: RecordType) -> RecordType {
    record
        .field("user", FieldType::record::<UserData>())
        .field("course", FieldType::record::<CourseData>())
        .field("mode", FieldType::of::<String>())
        .field("is_active", FieldType::of::<bool>())
        .field("creation_date", FieldType::of::<DateTime<Utc>>())
}

pub fn user_data() -> UserData {
    UserData {
        id: 1,
        is_active: true,
        pii: UserPersonalData {
            username: "username".to_string(),
            email: "email".to_string(),
            name: "name".to_string(),
        },
    }
}

pub fn course_data() -> CourseData {
    CourseData {
        course_key: "course-v1:edX+DemoX.1+2014".parse().expect("valid course key"),
        display_name: "display_name".to_string(),
        start: Some(Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap()),
        end: None,
    }
}

pub fn enrollment() -> CourseEnrollmentData {
    CourseEnrollmentData {
        user: user_data(),
        course: course_data(),
        mode: "mode".to_string(),
        is_active: false,
        creation_date: Utc.with_ymd_and_hms(2024, 2, 1, 12, 30, 15).unwrap(),
        created_by: Some(user_data()),
    }
}

pub fn test_data() -> RecordType {
    RecordType::new("TestData")
        .field("sub_name", FieldType::of::<String>())
        .field("course_id", FieldType::of::<String>())
}

/// `TestData` with the values every round trip sends
pub fn test_data_instance() -> RecordInstance {
    RecordInstance::new("TestData")
        .with("sub_name", "foo")
        .with("course_id", "bar")
}

/// A bridge over `record` with the default extensions and config
pub fn record_bridge(record: RecordType) -> AvroBridge {
    AvroBridge::new(record, ExtensionRegistry::with_defaults(), BridgeConfig::default()).unwrap()
}
