// Copyright (c) 2026 Ledgerflow
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![no_main]
#![forbid(unsafe_code)]

use ledgerflow::core::flows::wire::{AttestRequest, FinalityRequest, SignRequest};
use ledgerflow::core::types::decode_canonical_limited;
use libfuzzer_sys::fuzz_target;

// Inbound session payloads must never panic the responder, whatever the bytes.
fuzz_target!(|data: &[u8]| {
    if let Ok(req) = decode_canonical_limited::<SignRequest>(data, 1 << 16) {
        let _ = req.stx.check_id();
        let _ = req.stx.verify_signatures_except(&Default::default());
    }
    if let Ok(req) = decode_canonical_limited::<FinalityRequest>(data, 1 << 16) {
        let _ = req.stx.verify_required_signatures();
    }
    if let Ok(req) = decode_canonical_limited::<AttestRequest>(data, 1 << 16) {
        let _ = req.view.verify();
        let _ = req.view.view_id();
    }
});
