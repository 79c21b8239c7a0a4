pub mod deposit;
pub mod initialize_pool;
pub mod set_verification_key;
pub mod verify_withdrawal;
pub mod withdraw;

pub use deposit::*;
pub use initialize_pool::*;
pub use set_verification_key::*;
pub use verify_withdrawal::*;
pub use withdraw::*;
