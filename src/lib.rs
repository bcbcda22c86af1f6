/// Per-user balance row: primary and savings sub-ledgers.
/// State is modified using events, which are created by handling requests
pub mod account;

/// Bills issued to users and their one-way paid flag.
pub mod bill;

/// Validated engine requests, built from raw gateway input.
pub mod command;

/// Runtime settings read from the environment.
pub mod config;

/// Account rows behind individual locks, and the atomic scope that
/// stages balance changes across them.
pub mod store;

/// Append-only transaction log and its history projections.
pub mod transaction;

/// Ledger engine interface, plus "in memory" implementation.
/// Coordinates validation, locking, balance events and the transaction log.
pub mod processor;

/// Drives the engine from a CSV operation script. Used by the binary and
/// by the integration tests.
pub mod bin_utils;
