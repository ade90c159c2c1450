mod account;
mod monitor;
mod queue;
