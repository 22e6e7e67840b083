pub mod process_transaction;
pub mod tokenization;

pub use process_transaction::{
    payment_command_rules, GetTransactionHandler, GetTransactionQuery, ProcessTransactionCommand,
    ProcessTransactionHandler,
};
pub use tokenization::TokenizationService;
