// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! Generates (or prints) a node's identity key under a data directory,
//! via the same [`Keystore`](libp2p_core_rs::identity::Keystore) `main`
//! uses, so a key produced here loads unchanged at startup.

use anyhow::Result;
use libp2p_core_rs::identity::Keystore;
use std::path::PathBuf;

fn main() -> Result<()> {
    let out_dir = std::env::args().nth(1).unwrap_or_else(|| "data".to_string());
    let keystore = Keystore::open(&PathBuf::from(out_dir))?;
    println!("{}", keystore.keypair().public().derive_peer_id());
    Ok(())
}
