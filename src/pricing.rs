//! Pricing estimator
//!
//! Approximate on-demand and spot rates used to decorate machine-type
//! listings. Values are USD per hour for one vCPU and one GB of memory.

use crate::provision::model::ProvisioningModel;

/// Billing hours in an average month
pub const HOURS_PER_MONTH: f64 = 730.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyRates {
    pub vcpu: f64,
    pub memory_gb: f64,
}

struct RegionRates {
    region: &'static str,
    standard: HourlyRates,
    spot: HourlyRates,
}

const fn rates(vcpu: f64, memory_gb: f64) -> HourlyRates {
    HourlyRates { vcpu, memory_gb }
}

const RATE_TABLE: &[RegionRates] = &[
    RegionRates {
        region: "us-central1",
        standard: rates(0.021811, 0.002923),
        spot: rates(0.006543, 0.000877),
    },
    RegionRates {
        region: "us-east1",
        standard: rates(0.021811, 0.002923),
        spot: rates(0.006543, 0.000877),
    },
    RegionRates {
        region: "us-west1",
        standard: rates(0.021811, 0.002923),
        spot: rates(0.006543, 0.000877),
    },
    RegionRates {
        region: "us-east4",
        standard: rates(0.024561, 0.003291),
        spot: rates(0.007368, 0.000987),
    },
    RegionRates {
        region: "europe-west1",
        standard: rates(0.023984, 0.003214),
        spot: rates(0.007195, 0.000964),
    },
    RegionRates {
        region: "europe-west4",
        standard: rates(0.024006, 0.003217),
        spot: rates(0.007202, 0.000965),
    },
    RegionRates {
        region: "asia-east1",
        standard: rates(0.025262, 0.003385),
        spot: rates(0.007579, 0.001016),
    },
    RegionRates {
        region: "asia-northeast1",
        standard: rates(0.028009, 0.003754),
        spot: rates(0.008403, 0.001126),
    },
    RegionRates {
        region: "asia-southeast1",
        standard: rates(0.026864, 0.0036),
        spot: rates(0.008059, 0.00108),
    },
];

const DEFAULT_RATES: RegionRates = RegionRates {
    region: "default",
    standard: rates(0.025, 0.0034),
    spot: rates(0.0075, 0.00102),
};

/// Hourly rates for a region, falling back to the default row
pub fn hourly_rates(region: &str, model: ProvisioningModel) -> HourlyRates {
    let row = RATE_TABLE
        .iter()
        .find(|r| r.region == region)
        .unwrap_or(&DEFAULT_RATES);

    match model {
        ProvisioningModel::Standard => row.standard,
        ProvisioningModel::Spot => row.spot,
    }
}

/// `(vcpu_rate * vcpus + mem_rate * memory_gb) * 730`, rounded to cents
pub fn estimate_monthly_cost(
    region: &str,
    model: ProvisioningModel,
    vcpus: f64,
    memory_gb: f64,
) -> f64 {
    let rates = hourly_rates(region, model);
    let monthly = (rates.vcpu * vcpus + rates.memory_gb * memory_gb) * HOURS_PER_MONTH;
    (monthly * 100.0).round() / 100.0
}

pub fn format_monthly_estimate(cost: f64) -> String {
    format!("~${:.2}/mo", cost)
}
