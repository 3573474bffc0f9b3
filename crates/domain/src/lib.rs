//! # hkmiio-domain
//!
//! Pure domain model for the hkmiio bridge.
//!
//! ## Responsibilities
//! - Foundational types: device identifiers, error conventions, timestamps
//! - Define **Devices** (kinds of miIO hardware the bridge understands)
//! - Define **Inbound events** (state changes reported by a device)
//! - Define **Outbound commands** (control actions sent to a device)
//! - Define **Characteristics** (typed accessory properties and their values)
//! - Define **Accessory descriptors** (metadata handed to the presentation transport)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod accessory;
pub mod characteristic;
pub mod command;
pub mod device;
pub mod event;
