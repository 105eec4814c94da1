//! Unified error types for the scheduling engine.
//!
//! Scheduling conflicts (`Blocked`, `DoubleBooked`, `OnlineBookingImmutable`,
//! `InvalidInterval`, `StaleState`) are expected outcomes that callers surface to the
//! user with a remediation hint. Everything else is an opaque failure.

use crate::core::commitment::CommitmentSource;
use thiserror::Error;

/// Every error the crate can return.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable explanation
        message: String,
    },

    /// Any database failure not related to scheduling
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// File system failure (config file, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The target interval is covered by a schedule block
    #[error("Time slot is blocked (block {block_id})")]
    Blocked {
        /// The block that covers the requested interval
        block_id: i64,
    },

    /// The target interval is already taken by another booking
    #[error("Time slot is already booked by {with}")]
    DoubleBooked {
        /// The booking that occupies the requested interval
        with: CommitmentSource,
    },

    /// Online bookings must be converted before they can be moved
    #[error("Online booking {booking_id} cannot be rescheduled by drag and drop")]
    OnlineBookingImmutable {
        /// Id of the online booking
        booking_id: i64,
    },

    /// End before start, zero duration, or malformed wall-clock strings
    #[error("Invalid interval: {message}")]
    InvalidInterval {
        /// Human-readable explanation
        message: String,
    },

    /// The persistence layer rejected a write that passed in-memory validation
    #[error("Slot for barber {barber_id} just became unavailable")]
    StaleState {
        /// Barber whose agenda changed underneath the request
        barber_id: i64,
    },

    /// Appointment is not in a state that allows the operation
    #[error("Appointment {appointment_id} is {status}, expected SCHEDULED")]
    NotScheduled {
        /// Id of the appointment
        appointment_id: i64,
        /// Current status
        status: String,
    },

    /// Request is structurally invalid (no services, date out of window, ...)
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Human-readable explanation
        message: String,
    },

    /// Negative or non-finite monetary value
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Not enough stock to sell a product line
    #[error("Insufficient stock for {name}: available {available}, requested {requested}")]
    InsufficientStock {
        /// Product name
        name: String,
        /// Units in stock
        available: i32,
        /// Units requested
        requested: i32,
    },

    /// Appointment id does not exist
    #[error("Appointment not found: {id}")]
    AppointmentNotFound {
        /// The missing id
        id: i64,
    },

    /// Online booking id does not exist
    #[error("Online booking not found: {id}")]
    OnlineBookingNotFound {
        /// The missing id
        id: i64,
    },

    /// Barber id does not exist or is inactive
    #[error("Barber not found: {id}")]
    BarberNotFound {
        /// The missing id
        id: i64,
    },

    /// Client id does not exist
    #[error("Client not found: {id}")]
    ClientNotFound {
        /// The missing id
        id: i64,
    },

    /// Service id does not exist
    #[error("Service not found: {id}")]
    ServiceNotFound {
        /// The missing id
        id: i64,
    },

    /// Product id does not exist or was deleted
    #[error("Product not found: {id}")]
    ProductNotFound {
        /// The missing id
        id: i64,
    },

    /// Subscription id does not exist
    #[error("Subscription not found: {id}")]
    SubscriptionNotFound {
        /// The missing id
        id: i64,
    },

    /// Schedule block id does not exist
    #[error("Schedule block not found: {id}")]
    BlockNotFound {
        /// The missing id
        id: i64,
    },
}

impl Error {
    /// Returns true for the expected scheduling outcomes that a user can act on.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Blocked { .. }
                | Self::DoubleBooked { .. }
                | Self::OnlineBookingImmutable { .. }
                | Self::InvalidInterval { .. }
                | Self::StaleState { .. }
        )
    }

    /// User-facing remediation for recoverable scheduling errors.
    #[must_use]
    pub const fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::Blocked { .. } => {
                Some("This time is blocked. Ask an administrator to remove the block.")
            }
            Self::DoubleBooked { .. } => {
                Some("This time is already booked. Please pick another time.")
            }
            Self::OnlineBookingImmutable { .. } => {
                Some("Online bookings must be converted before they can be moved.")
            }
            Self::InvalidInterval { .. } => Some("Check the start and end times."),
            Self::StaleState { .. } => {
                Some("This slot just became unavailable. Refresh and choose another one.")
            }
            _ => None,
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
