//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables. Cross-table references are
//! plain id columns maintained by the workflows in `core`, not foreign keys.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod account;
pub mod account_child;
pub mod bill;
pub mod note;
pub mod one_off_payment;
pub mod payday;
pub mod user;

// Re-export specific types to avoid conflicts
pub use account::{Column as AccountColumn, Entity as Account, Model as AccountModel};
pub use account_child::{
    ChildKind, Column as AccountChildColumn, Entity as AccountChild, Model as AccountChildModel,
};
pub use bill::{Column as BillColumn, Entity as Bill, Model as BillModel};
pub use note::{Column as NoteColumn, Entity as Note, Model as NoteModel};
pub use one_off_payment::{
    Column as OneOffPaymentColumn, Entity as OneOffPayment, Model as OneOffPaymentModel,
};
pub use payday::{
    BankHolidayRegion, Column as PaydayColumn, Entity as Payday, Model as PaydayModel,
    PayFrequency, PaydayType, Weekday,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
