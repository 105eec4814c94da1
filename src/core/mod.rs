/// Appointment lifecycle: booking, line edits, completion and cancellation
pub mod appointment;

/// Barber records and lookups
pub mod barber;

/// Client records and phone-based matching
pub mod client;

/// Shop wall-clock time and UTC conversion
pub mod clock;

/// Unified view of everything that occupies a barber's agenda
pub mod commitment;

/// Placement validation against blocks and other bookings
pub mod conflict;

/// Half-open time intervals and overlap
pub mod interval;

/// Client-submitted bookings and their conversion into appointments
pub mod online_booking;

/// Price and commission resolution
pub mod pricing;

/// Product catalog and stock
pub mod product;

/// Moving appointments on the agenda
pub mod reschedule;

/// Snapshot loading and the availability board
pub mod schedule;

/// Admin-created unavailability windows
pub mod schedule_block;

/// Service catalog
pub mod service;

/// Slot board generation
pub mod slots;

/// Client subscriptions and coverage
pub mod subscription;
