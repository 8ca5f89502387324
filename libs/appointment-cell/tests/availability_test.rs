mod common;

use std::collections::BTreeSet;

use assert_matches::assert_matches;
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, RescheduleAppointmentRequest};
use appointment_cell::services::slot_grid::generate_slot_grid;

use common::{principal, Fixture, BOOKING_DATE};

#[tokio::test]
async fn book_then_reschedule_moves_the_booked_slot() {
    let fx = Fixture::new().await;
    let patient = fx.patient_principal();

    let grid = generate_slot_grid(&fx.doctor.working_hours_start, &fx.doctor.working_hours_end, 30).unwrap();
    assert_eq!(Fixture::labels(&grid), vec!["09:00", "09:30", "10:00", "10:30"]);

    let open = fx.state.booking.get_available_slots(fx.doctor.id, BOOKING_DATE).await.unwrap();
    assert_eq!(Fixture::labels(&open.available), Fixture::labels(&grid));
    assert!(open.booked.is_empty());

    let apt = fx.state.booking.create_appointment(fx.request("09:30"), &patient).await.unwrap();
    let after_booking = fx.state.booking.get_available_slots(fx.doctor.id, BOOKING_DATE).await.unwrap();
    assert_eq!(Fixture::labels(&after_booking.available), vec!["09:00", "10:00", "10:30"]);
    assert_eq!(Fixture::labels(&after_booking.booked), vec!["09:30"]);

    fx.state
        .booking
        .reschedule_appointment(apt.id, RescheduleAppointmentRequest {
            time_slot: Some("10:00".to_string()),
            ..Default::default()
        }, &patient)
        .await
        .unwrap();
    let after_move = fx.state.booking.get_available_slots(fx.doctor.id, BOOKING_DATE).await.unwrap();
    assert_eq!(Fixture::labels(&after_move.available), vec!["09:00", "09:30", "10:30"]);
    assert_eq!(Fixture::labels(&after_move.booked), vec!["10:00"]);
}

#[tokio::test]
async fn available_and_booked_partition_the_grid() {
    let fx = Fixture::new().await;
    let patient = fx.patient_principal();
    let admin = fx.admin_principal();

    // Other doctor: 08:00-12:00 every 20 minutes.
    for slot in ["08:00", "09:40", "11:40"] {
        let mut request = fx.request(slot);
        request.doctor_id = Some(fx.other_doctor.id);
        request.department_id = Some(fx.other_department.id);
        request.patient_id = Some(fx.patient.id);
        fx.state.booking.create_appointment(request, &admin).await.unwrap();
    }
    // A cancelled booking must not show up as booked.
    let mut cancelled = fx.request("10:20");
    cancelled.doctor_id = Some(fx.other_doctor.id);
    cancelled.department_id = Some(fx.other_department.id);
    let apt = fx.state.booking.create_appointment(cancelled, &patient).await.unwrap();
    fx.state.booking.update_status(apt.id, "cancelled", &patient).await.unwrap();

    let slots = fx.state.booking.get_available_slots(fx.other_doctor.id, BOOKING_DATE).await.unwrap();
    let grid = generate_slot_grid("08:00", "12:00", 20).unwrap();

    let available: BTreeSet<_> = slots.available.iter().copied().collect();
    let booked: BTreeSet<_> = slots.booked.iter().copied().collect();
    assert!(available.is_disjoint(&booked));
    assert_eq!(available.union(&booked).copied().collect::<Vec<_>>(), grid);
    assert_eq!(Fixture::labels(&slots.booked), vec!["08:00", "09:40", "11:40"]);
    assert!(slots.available.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn other_dates_and_doctors_are_independent() {
    let fx = Fixture::new().await;
    let patient = fx.patient_principal();
    fx.state.booking.create_appointment(fx.request("09:00"), &patient).await.unwrap();

    let next_day = fx.state.booking.get_available_slots(fx.doctor.id, "2030-01-16").await.unwrap();
    assert!(next_day.booked.is_empty());

    let other = fx.state.booking.get_available_slots(fx.other_doctor.id, BOOKING_DATE).await.unwrap();
    assert!(other.booked.is_empty());
}

#[tokio::test]
async fn availability_needs_a_known_doctor_and_a_valid_date() {
    let fx = Fixture::new().await;

    assert_matches!(
        fx.state.booking.get_available_slots(Uuid::new_v4(), BOOKING_DATE).await,
        Err(AppointmentError::NotFound { entity: "doctor", .. })
    );
    assert_matches!(
        fx.state.booking.get_available_slots(fx.doctor.id, "15/01/2030").await,
        Err(AppointmentError::Validation(_))
    );
}

#[tokio::test]
async fn soft_deleted_bookings_release_their_slot() {
    let fx = Fixture::new().await;
    let (user, _) = fx.add_patient("second@example.com", "Second").await;
    let second = principal(&user);

    let apt = fx.state.booking.create_appointment(fx.request("10:30"), &second).await.unwrap();
    fx.state.booking.soft_delete_appointment(apt.id, &second).await.unwrap();

    let slots = fx.state.booking.get_available_slots(fx.doctor.id, BOOKING_DATE).await.unwrap();
    assert!(slots.booked.is_empty());
    assert_eq!(slots.available.len(), 4);
}
