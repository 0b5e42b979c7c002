//! End-to-end tests: the controller on a loopback port, driven by a scripted
//! OpenFlow switch over TCP
//!
//! Run with: cargo test --test e2e

mod fake_switch;
mod session;
mod switching;
