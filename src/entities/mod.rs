//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod appointment;
pub mod appointment_product;
pub mod appointment_service;
pub mod barber;
pub mod client;
pub mod commission;
pub mod online_booking;
pub mod online_booking_service;
pub mod product;
pub mod schedule_block;
pub mod service;
pub mod subscription;

// Re-export specific types to avoid conflicts
pub use appointment::{Entity as Appointment, Model as AppointmentModel};
pub use appointment_product::{Entity as AppointmentProduct, Model as AppointmentProductModel};
pub use appointment_service::{Entity as AppointmentService, Model as AppointmentServiceModel};
pub use barber::{Entity as Barber, Model as BarberModel};
pub use client::{Entity as Client, Model as ClientModel};
pub use commission::{Entity as Commission, Model as CommissionModel};
pub use online_booking::{Entity as OnlineBooking, Model as OnlineBookingModel};
pub use online_booking_service::{
    Entity as OnlineBookingService, Model as OnlineBookingServiceModel,
};
pub use product::{Entity as Product, Model as ProductModel};
pub use schedule_block::{Entity as ScheduleBlock, Model as ScheduleBlockModel};
pub use service::{Entity as Service, Model as ServiceModel};
pub use subscription::{Entity as Subscription, Model as SubscriptionModel};
