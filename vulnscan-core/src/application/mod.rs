pub mod accounts;
pub mod unit_of_work;

pub use accounts::{
    AccountError, AccountService, LoginOutcome, Registration,
    RegistrationRequest,
};
pub use unit_of_work::AppUnitOfWork;
