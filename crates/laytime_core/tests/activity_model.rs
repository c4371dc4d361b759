use chrono::{DateTime, Duration, TimeZone, Utc, Weekday};
use laytime_core::{
    is_chained, Activity, ActivityType, ActivityValidationError, LayTime, Percentage,
};
use uuid::Uuid;

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, minute, 0)
        .single()
        .expect("valid test timestamp")
}

#[test]
fn new_at_creates_unknown_zero_duration_row() {
    let activity = Activity::new_at(at(1, 10, 0));

    assert!(!activity.id.is_nil());
    assert_eq!(activity.activity_type, ActivityType::Unknown);
    assert_eq!(activity.percentage, Percentage::NONE);
    assert_eq!(activity.duration(), Duration::zero());
    assert!(activity.remarks.is_empty());
    assert!(activity.deductions.is_empty());
}

#[test]
fn between_rejects_reversed_interval() {
    let err = Activity::between(ActivityType::Loading, at(1, 12, 0), at(1, 11, 0)).unwrap_err();
    assert_eq!(
        err,
        ActivityValidationError::ReversedInterval {
            from: at(1, 12, 0),
            to: at(1, 11, 0),
        }
    );
}

#[test]
fn day_reports_weekday_of_start() {
    // 2024-03-01 is a Friday.
    let activity = Activity::between(ActivityType::Waiting, at(1, 23, 0), at(2, 2, 0)).unwrap();
    assert_eq!(activity.day(), Weekday::Fri);
    assert_eq!(activity.duration(), Duration::hours(3));
}

#[test]
fn counted_duration_treats_reversed_interval_as_zero() {
    let mut activity = Activity::between(ActivityType::Loading, at(1, 8, 0), at(1, 9, 0)).unwrap();
    activity.to_date_time = at(1, 7, 0);

    assert_eq!(activity.duration(), Duration::hours(-1));
    assert_eq!(activity.counted_duration(), Duration::zero());
    assert!(activity.validate().is_err());
    assert!(activity.clamp_interval());
    assert!(activity.validate().is_ok());
}

#[test]
fn chained_pair_allows_one_minute_of_drift() {
    let prev = Activity::between(ActivityType::Berthing, at(1, 8, 0), at(1, 9, 0)).unwrap();
    let next = Activity::between(ActivityType::Loading, at(1, 9, 1), at(1, 10, 0)).unwrap();
    let gapped = Activity::between(ActivityType::Loading, at(1, 9, 2), at(1, 10, 0)).unwrap();

    assert!(is_chained(&prev, &next));
    assert!(!is_chained(&prev, &gapped));
}

#[test]
fn activity_serialization_uses_expected_wire_fields() {
    let id = Uuid::parse_str("11111111-2222-4333-8444-555555555555").unwrap();
    let mut activity = Activity::with_id(id, ActivityType::Bunkering, at(4, 6, 0), at(4, 8, 30))
        .unwrap();
    activity.percentage = Percentage::HALF;
    activity.remarks = "Barge alongside".to_string();
    activity.deductions = "Rain".to_string();

    let json = serde_json::to_value(&activity).unwrap();
    assert_eq!(json["id"], id.to_string());
    assert_eq!(json["activityType"], "Bunkering");
    assert_eq!(json["fromDateTime"], "2024-03-04T06:00:00Z");
    assert_eq!(json["toDateTime"], "2024-03-04T08:30:00Z");
    assert_eq!(json["percentage"], 50);
    assert_eq!(json["remarks"], "Barge alongside");
    assert_eq!(json["deductions"], "Rain");

    let decoded: Activity = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, activity);
}

#[test]
fn deserialize_rejects_percentage_outside_allowed_set() {
    let json = serde_json::json!({
        "id": "11111111-2222-4333-8444-555555555555",
        "activityType": "Loading",
        "fromDateTime": "2024-03-04T06:00:00Z",
        "toDateTime": "2024-03-04T07:00:00Z",
        "percentage": 25,
        "remarks": "",
        "deductions": ""
    });

    assert!(serde_json::from_value::<Activity>(json).is_err());
}

#[test]
fn lay_time_floors_negative_allowance() {
    let lay_time = LayTime::new(
        "LT-9",
        "Santos",
        "Soybeans",
        Duration::minutes(-30),
        at(1, 0, 0),
        at(5, 0, 0),
    );
    assert_eq!(lay_time.allowed(), Duration::zero());

    let json = serde_json::to_value(&lay_time).unwrap();
    assert_eq!(json["portName"], "Santos");
    assert_eq!(json["allowedMinutes"], 0);
}
