//! Execution metering: gas accounting, instruction counting, timers
//!
//! The engine accepts an optional [`Measure`] collaborator. When present,
//! every dispatched instruction adds its table-defined cost to the running
//! sum and every host call adds its declared cost before running; crossing
//! the cost limit traps with `CostLimitExceeded`. Without a `Measure` the
//! engine runs unmetered.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Which cost table is active.
///
/// Profiles are ordered by priority: registering an EVM host module
/// upgrades a WASI profile, never the other way around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CostProfile {
    Base,
    Wasi,
    Evm,
}

/// Per-opcode gas costs.
///
/// Keyed by the instruction's binary opcode byte; opcodes without an
/// override charge the default. Embedders install their own tables through
/// [`Measure::set_cost_table`].
#[derive(Debug, Clone)]
pub struct CostTable {
    default_cost: u64,
    overrides: HashMap<u8, u64>,
}

impl CostTable {
    /// A table charging `cost` for every opcode
    pub fn uniform(cost: u64) -> Self {
        CostTable {
            default_cost: cost,
            overrides: HashMap::new(),
        }
    }

    /// The table for a profile
    ///
    /// All bundled profiles charge one gas per instruction; EVM-grade
    /// charging happens at the host boundary (declared host costs and the
    /// copy-cost formula), not per wasm opcode.
    pub fn for_profile(_profile: CostProfile) -> Self {
        CostTable::uniform(1)
    }

    /// Override the cost of one opcode
    pub fn set_cost(&mut self, opcode: u8, cost: u64) {
        self.overrides.insert(opcode, cost);
    }

    /// The cost charged for `opcode`
    pub fn cost_of(&self, opcode: u8) -> u64 {
        self.overrides.get(&opcode).copied().unwrap_or(self.default_cost)
    }
}

impl Default for CostTable {
    fn default() -> Self {
        CostTable::uniform(1)
    }
}

/// Tags for the wall-clock recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerTag {
    /// Time spent dispatching wasm instructions.
    Execution,
    /// Time spent inside host functions.
    HostFunc,
}

/// Accumulating wall-clock recorder, one slot per tag.
#[derive(Debug, Default)]
pub struct TimeRecorder {
    running: HashMap<TimerTag, Instant>,
    recorded: HashMap<TimerTag, Duration>,
}

impl TimeRecorder {
    /// Start (or restart) the clock for `tag`
    pub fn start_record(&mut self, tag: TimerTag) {
        self.running.insert(tag, Instant::now());
    }

    /// Stop the clock for `tag`, folding the elapsed time into its record
    pub fn stop_record(&mut self, tag: TimerTag) -> Duration {
        if let Some(started) = self.running.remove(&tag) {
            let elapsed = started.elapsed();
            *self.recorded.entry(tag).or_default() += elapsed;
            elapsed
        } else {
            Duration::ZERO
        }
    }

    /// Total recorded time for `tag`
    pub fn get_record(&self, tag: TimerTag) -> Duration {
        self.recorded.get(&tag).copied().unwrap_or_default()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.running.clear();
        self.recorded.clear();
    }
}

/// The metering state: cost table, budget, counters, and timers.
#[derive(Debug)]
pub struct Measure {
    cost_table: CostTable,
    profile: CostProfile,
    cost_limit: u64,
    cost_sum: u64,
    instr_cnt: u64,
    timers: TimeRecorder,
}

impl Default for Measure {
    fn default() -> Self {
        Measure::new()
    }
}

impl Measure {
    /// Unlimited budget, base cost table
    pub fn new() -> Self {
        Measure {
            cost_table: CostTable::for_profile(CostProfile::Base),
            profile: CostProfile::Base,
            cost_limit: u64::MAX,
            cost_sum: 0,
            instr_cnt: 0,
            timers: TimeRecorder::default(),
        }
    }

    pub fn set_cost_table(&mut self, table: CostTable) {
        self.cost_table = table;
    }

    /// Switch to `profile`'s table if it outranks the active one
    pub fn upgrade_profile(&mut self, profile: CostProfile) {
        if profile > self.profile {
            self.profile = profile;
            self.cost_table = CostTable::for_profile(profile);
        }
    }

    pub fn profile(&self) -> CostProfile {
        self.profile
    }

    pub fn set_cost_limit(&mut self, limit: u64) {
        self.cost_limit = limit;
    }

    pub fn cost_limit(&self) -> u64 {
        self.cost_limit
    }

    /// Gas spent so far
    pub fn cost_sum(&self) -> u64 {
        self.cost_sum
    }

    /// Instructions dispatched so far
    pub fn instr_count(&self) -> u64 {
        self.instr_cnt
    }

    /// Count one dispatched instruction
    pub fn inc_instr_count(&mut self) {
        self.instr_cnt += 1;
    }

    /// Charge the table cost of `opcode`; false if the budget is exhausted
    pub fn add_instr_cost(&mut self, opcode: u8) -> bool {
        self.add_cost(self.cost_table.cost_of(opcode))
    }

    /// Charge `cost` gas; false if the budget is exhausted
    ///
    /// On exhaustion the sum saturates at the limit, so `cost_sum` never
    /// reports more than the budget.
    pub fn add_cost(&mut self, cost: u64) -> bool {
        match self.cost_sum.checked_add(cost) {
            Some(sum) if sum <= self.cost_limit => {
                self.cost_sum = sum;
                true
            }
            _ => {
                self.cost_sum = self.cost_limit;
                false
            }
        }
    }

    /// Refund `cost` gas (a host returning leftover gas)
    pub fn sub_cost(&mut self, cost: u64) {
        self.cost_sum = self.cost_sum.saturating_sub(cost);
    }

    pub fn timers(&mut self) -> &mut TimeRecorder {
        &mut self.timers
    }

    /// Reset counters and timers; the table, profile, and limit stay
    pub fn clear(&mut self) {
        self.cost_sum = 0;
        self.instr_cnt = 0;
        self.timers.clear();
    }
}
