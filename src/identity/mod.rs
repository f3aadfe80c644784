// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Persistent node identity: loading and storing the long-lived
//! [`Keypair`](crate::keypair::Keypair) a node presents during the
//! security handshake.

pub mod keystore;

pub use keystore::{IdentityError, Keystore};
