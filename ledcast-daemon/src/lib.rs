pub mod cli_args;
pub mod consumers;
pub mod producers;
