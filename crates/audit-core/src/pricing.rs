use crate::settings::AuditSettings;

/// Wasabi storage pricing: a flat rate per TB plus sales tax.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoragePricing {
    /// US dollars per TB per month, before tax.
    pub cost_per_tb: f64,
    /// Sales tax as a fraction, e.g. `0.0685`.
    pub tax_rate: f64,
}

/// Taxed cost split by storage class.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostBreakdown {
    pub active_cost: f64,
    pub deleted_cost: f64,
    pub total_cost: f64,
}

impl CostBreakdown {
    /// Accumulate another breakdown into this one.
    pub fn add(&mut self, other: &CostBreakdown) {
        self.active_cost += other.active_cost;
        self.deleted_cost += other.deleted_cost;
        self.total_cost += other.total_cost;
    }
}

impl StoragePricing {
    pub fn new(cost_per_tb: f64, tax_rate: f64) -> Self {
        Self {
            cost_per_tb,
            tax_rate,
        }
    }

    /// Pricing taken from the run's settings.
    pub fn from_settings(settings: &AuditSettings) -> Self {
        Self::new(settings.wasabi_cost_per_tb, settings.sales_tax_rate)
    }

    /// Taxed cost of `storage_tb`: `tb × cost_per_tb × (1 + tax_rate)`.
    ///
    /// Not rounded; callers round only for display.
    pub fn cost(&self, storage_tb: f64) -> f64 {
        storage_tb * self.cost_per_tb * (1.0 + self.tax_rate)
    }

    /// Price active and deleted storage separately and total them.
    pub fn breakdown(&self, active_tb: f64, deleted_tb: f64) -> CostBreakdown {
        let active_cost = self.cost(active_tb);
        let deleted_cost = self.cost(deleted_tb);
        CostBreakdown {
            active_cost,
            deleted_cost,
            total_cost: active_cost + deleted_cost,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
