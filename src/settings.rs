use serde::{Deserialize, Serialize};

/// How a mutated soup byte is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationType {
    /// Add or subtract one, modulo the instruction set size
    AddOrDec,
    /// Flip one of the low five bits, uniformly chosen
    BitFlip,
    /// Resample uniformly from the whole instruction set
    RandomChoice,
}

/// Placement policy for a daughter allocated by `mal`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaughterAllocationStrategy {
    /// Uniform random offsets from the parent until a free span is hit
    Random,
    /// One random offset, then an outward search from it
    RandomPacked,
    /// Outward search from the address in BX
    Closest,
    /// Outward search from the address in AX
    Preferred,
}

/// Bias of the initial slice size over creature length
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SizeSelection {
    /// Every creature gets the slicer's default slice
    Constant,
    /// Slice equals creature length
    Proportional,
    /// Slice is length raised to `exponent`
    Power { exponent: f64 },
}

/// Tunable parameters of a world.
///
/// The three mutation streams are stored as rates (events per instruction,
/// or per `mov_iab` for copy errors); a rate of zero disables the stream.
/// The mean-interval accessors and setters are the reciprocal view of the
/// same numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    soup_size: u32,
    flaw_rate: f64,
    copy_error_rate: f64,
    cosmic_rate: f64,
    mutation_type: MutationType,
    reap_threshold: f64,
    daughter_allocation_strategy: DaughterAllocationStrategy,
    size_selection: SizeSelection,
    slice_size_variance: f64,
    clear_reaped_creatures: bool,
    template_search_window: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            soup_size: 0,
            flaw_rate: 0.0,
            copy_error_rate: 0.0,
            cosmic_rate: 0.0,
            mutation_type: MutationType::AddOrDec,
            reap_threshold: 0.8,
            daughter_allocation_strategy: DaughterAllocationStrategy::Closest,
            size_selection: SizeSelection::Constant,
            slice_size_variance: 0.0,
            clear_reaped_creatures: false,
            template_search_window: 1024,
        }
    }
}

impl Settings {
    pub fn soup_size(&self) -> u32 {
        self.soup_size
    }

    /// Recorded by the world at `initialize_soup`
    pub fn update_with_soup_size(&mut self, soup_size: u32) {
        self.soup_size = soup_size;
        self.template_search_window = self.template_search_window.min(soup_size);
    }

    pub fn flaw_rate(&self) -> f64 {
        self.flaw_rate
    }

    pub fn set_flaw_rate(&mut self, rate: f64) {
        self.flaw_rate = rate.max(0.0);
    }

    /// Mean instructions between flaws; zero when flaws are disabled
    pub fn mean_flaw_interval(&self) -> f64 {
        if self.flaw_rate > 0.0 {
            1.0 / self.flaw_rate
        } else {
            0.0
        }
    }

    pub fn set_mean_flaw_interval(&mut self, interval: f64) {
        self.flaw_rate = if interval > 0.0 { 1.0 / interval } else { 0.0 };
    }

    pub fn copy_error_rate(&self) -> f64 {
        self.copy_error_rate
    }

    pub fn set_copy_error_rate(&mut self, rate: f64) {
        self.copy_error_rate = rate.max(0.0);
    }

    /// Mean `mov_iab` executions between copy errors
    pub fn mean_copy_error_interval(&self) -> f64 {
        if self.copy_error_rate > 0.0 {
            1.0 / self.copy_error_rate
        } else {
            0.0
        }
    }

    pub fn set_mean_copy_error_interval(&mut self, interval: f64) {
        self.copy_error_rate = if interval > 0.0 { 1.0 / interval } else { 0.0 };
    }

    pub fn cosmic_rate(&self) -> f64 {
        self.cosmic_rate
    }

    pub fn set_cosmic_rate(&mut self, rate: f64) {
        self.cosmic_rate = rate.max(0.0);
    }

    /// Mean instructions between cosmic rays
    pub fn mean_cosmic_time_interval(&self) -> f64 {
        if self.cosmic_rate > 0.0 {
            1.0 / self.cosmic_rate
        } else {
            0.0
        }
    }

    pub fn set_mean_cosmic_time_interval(&mut self, interval: f64) {
        self.cosmic_rate = if interval > 0.0 { 1.0 / interval } else { 0.0 };
    }

    pub fn mutation_type(&self) -> MutationType {
        self.mutation_type
    }

    pub fn set_mutation_type(&mut self, mutation_type: MutationType) {
        self.mutation_type = mutation_type;
    }

    /// Fullness fraction above which the reaper fires at slice boundaries
    pub fn reap_threshold(&self) -> f64 {
        self.reap_threshold
    }

    pub fn set_reap_threshold(&mut self, threshold: f64) {
        self.reap_threshold = threshold.clamp(0.0, 1.0);
    }

    pub fn daughter_allocation_strategy(&self) -> DaughterAllocationStrategy {
        self.daughter_allocation_strategy
    }

    pub fn set_daughter_allocation_strategy(&mut self, strategy: DaughterAllocationStrategy) {
        self.daughter_allocation_strategy = strategy;
    }

    pub fn size_selection(&self) -> SizeSelection {
        self.size_selection
    }

    pub fn set_size_selection(&mut self, selection: SizeSelection) {
        self.size_selection = selection;
    }

    pub fn slice_size_variance(&self) -> f64 {
        self.slice_size_variance
    }

    pub fn set_slice_size_variance(&mut self, variance: f64) {
        self.slice_size_variance = variance.max(0.0);
    }

    /// Whether a reaped creature's soup region is zeroed
    pub fn clear_reaped_creatures(&self) -> bool {
        self.clear_reaped_creatures
    }

    pub fn set_clear_reaped_creatures(&mut self, clear: bool) {
        self.clear_reaped_creatures = clear;
    }

    /// Search radius for template-addressed control flow
    pub fn template_search_window(&self) -> u32 {
        self.template_search_window
    }

    pub fn set_template_search_window(&mut self, window: u32) {
        self.template_search_window = window.max(1);
    }
}
