//! Payment gateway trait and random simulator.

use async_trait::async_trait;
use common::OrderId;
use domain::Order;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::error::ServiceError;

/// Probability (percent) that the simulated gateway authorizes a charge.
const SUCCESS_PERCENT: u32 = 70;

/// Trait for payment authorization, the seam where a real gateway
/// protocol would plug in.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns whether the charge for `order` was authorized.
    async fn authorize(&self, order: &Order) -> Result<bool, ServiceError>;
}

/// Pseudo-random gateway simulator with a 70% success rate.
///
/// With a configured seed the outcome is a pure function of the seed
/// and the order identity, so repeated calls for the same order are
/// reproducible regardless of call order. The RNG is owned per call;
/// no shared generator state is mutated.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedGateway {
    seed: Option<u64>,
}

impl SimulatedGateway {
    /// Creates a simulator drawing from thread-local entropy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a deterministic simulator for the given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    /// The deterministic outcome for one (seed, order) pair.
    pub fn outcome(seed: u64, order_id: OrderId) -> bool {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(order_id.as_i64() as u64));
        rng.gen_range(1..=100u32) <= SUCCESS_PERCENT
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn authorize(&self, order: &Order) -> Result<bool, ServiceError> {
        let authorized = match self.seed {
            Some(seed) => Self::outcome(seed, order.id()),
            None => rand::thread_rng().gen_range(1..=100u32) <= SUCCESS_PERCENT,
        };
        Ok(authorized)
    }
}
