// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! End-to-end scenarios exercising the full router stack (RRG -> connection router -> net
//! router -> negotiation loop) rather than one module in isolation.

#[allow(dead_code)]
fn init() {
    let _ = env_logger::builder().is_test(true).filter_level(log::LevelFilter::Debug).try_init();
}

mod scenario_high_fanout_seeding;
#[cfg(feature = "parallel")]
mod scenario_parallel_determinism;
mod scenario_unrouteable_sink;
