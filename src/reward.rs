//! Reward-splitting pipeline.
//!
//! Applies the enabled set of per-coin reward splits, in a fixed order,
//! deducting from a running `reward_to_pool` that starts at
//! `coinbase_value`. The enabled splits are resolved once, from
//! `RewardFeatures` and `RewardExtras`, rather than branched on per share —
//! reward splitting only ever runs once, at `Job::init`, since the coinbase
//! transaction doesn't change across share submissions for the same job.

use std::str::FromStr;

use bitcoin::{Address, Network, ScriptBuf};

use crate::error::InitError;
use crate::template::{MasternodeTarget, RewardExtras, RewardFeatures, RewardTarget};

/// A resolved payout: a scriptPubKey and a satoshi amount.
#[derive(Debug, Clone)]
pub struct RewardOutput {
    pub value: u64,
    pub script_pubkey: ScriptBuf,
}

/// The result of running the reward-splitting pipeline: every non-pool
/// output, plus any coinbase-transaction side effects the splits trigger.
#[derive(Debug, Clone, Default)]
pub struct RewardPlan {
    /// Outputs for every split except the final pool payout.
    pub outputs: Vec<RewardOutput>,
    /// Set when a masternode target carries a `coinbase_payload`
    /// (`version = 3 | (5 << 16)`).
    pub coinbase_version_override: Option<u32>,
    /// The masternode `coinbase_payload`, to be appended as a varstring
    /// trailer in `coinbase_final`.
    pub masternode_coinbase_payload: Option<Vec<u8>>,
    /// What's left after every split has deducted its share. This becomes
    /// the pool's own output.
    pub reward_to_pool: u64,
}

/// Resolve a reward target's payout destination to a scriptPubKey,
/// preferring a raw `script` hex (as some daemons supply for e.g.
/// masternode payees) over parsing `address`.
pub fn resolve_script(
    target_field: &'static str,
    address: Option<&str>,
    script: Option<&str>,
    network: Network,
) -> Result<ScriptBuf, InitError> {
    if let Some(script_hex) = script {
        let bytes = hex::decode(script_hex).map_err(|_| InitError::InvalidHex {
            field: target_field,
            value: script_hex.to_string(),
        })?;
        return Ok(ScriptBuf::from_bytes(bytes));
    }
    if let Some(addr) = address {
        let parsed = Address::from_str(addr)
            .map_err(|_| InitError::InvalidHex {
                field: target_field,
                value: addr.to_string(),
            })?
            .require_network(network)
            .map_err(|_| InitError::InvalidHex {
                field: target_field,
                value: addr.to_string(),
            })?;
        return Ok(parsed.script_pubkey());
    }
    Err(InitError::MissingField(target_field))
}

/// Applies every enabled reward split, in a fixed order, and produces the
/// remaining pool reward.
pub struct RewardSplitter<'a> {
    features: &'a RewardFeatures,
    extra: &'a RewardExtras,
    network: Network,
}

impl<'a> RewardSplitter<'a> {
    pub fn new(features: &'a RewardFeatures, extra: &'a RewardExtras, network: Network) -> Self {
        Self {
            features,
            extra,
            network,
        }
    }

    pub fn apply(&self, coinbase_value: u64) -> Result<RewardPlan, InitError> {
        let mut plan = RewardPlan {
            reward_to_pool: coinbase_value,
            ..Default::default()
        };

        if self.features.payee {
            self.split_targets(&self.extra.payee, "extra.payee", &mut plan)?;
        }
        if self.features.masternode {
            self.split_masternode(&mut plan)?;
        }
        if self.features.founder {
            self.split_targets(&self.extra.founder, "extra.founder", &mut plan)?;
        }
        if self.features.minerdevfund {
            self.split_targets(&self.extra.minerdevfund, "extra.minerdevfund", &mut plan)?;
        }
        if self.features.minerfund {
            self.split_targets(&self.extra.minerfund, "extra.minerfund", &mut plan)?;
        }
        if self.features.community_autonomous {
            self.split_targets(
                &self.extra.community_autonomous,
                "extra.community-autonomous",
                &mut plan,
            )?;
        }
        if self.features.coinbase_dev_reward {
            if let Some(target) = &self.extra.coinbase_dev_reward {
                self.push_deducting(target, "extra.coinbase-dev-reward", &mut plan)?;
            }
        }
        if self.features.foundation {
            self.split_targets(&self.extra.foundation, "extra.foundation", &mut plan)?;
        }
        if self.features.community {
            self.split_targets(&self.extra.community, "extra.community", &mut plan)?;
        }
        if self.features.datamining {
            self.split_datamining(&mut plan)?;
        }
        if self.features.developer {
            self.split_targets(&self.extra.developer, "extra.developer", &mut plan)?;
        }

        Ok(plan)
    }

    fn split_targets(
        &self,
        field: &Option<crate::template::OneOrMany<RewardTarget>>,
        field_name: &'static str,
        plan: &mut RewardPlan,
    ) -> Result<(), InitError> {
        let Some(field) = field else { return Ok(()) };
        for target in clone_one_or_many(field) {
            self.push_deducting(&target, field_name, plan)?;
        }
        Ok(())
    }

    fn push_deducting(
        &self,
        target: &RewardTarget,
        field_name: &'static str,
        plan: &mut RewardPlan,
    ) -> Result<(), InitError> {
        let script = resolve_script(
            field_name,
            target.address.as_deref(),
            target.script.as_deref(),
            self.network,
        )?;
        plan.reward_to_pool = plan
            .reward_to_pool
            .checked_sub(target.amount)
            .ok_or(InitError::RewardOverdraft {
                shortfall: target.amount.saturating_sub(plan.reward_to_pool),
            })?;
        plan.outputs.push(RewardOutput {
            value: target.amount,
            script_pubkey: script,
        });
        Ok(())
    }

    fn split_masternode(&self, plan: &mut RewardPlan) -> Result<(), InitError> {
        let Some(field) = &self.extra.masternode else {
            return Ok(());
        };
        for target in clone_one_or_many(field) {
            self.push_masternode_target(&target, plan)?;
        }
        Ok(())
    }

    fn push_masternode_target(
        &self,
        target: &MasternodeTarget,
        plan: &mut RewardPlan,
    ) -> Result<(), InitError> {
        self.push_deducting(&target.reward, "extra.masternode", plan)?;
        if let Some(payload_hex) = &target.coinbase_payload {
            if plan.masternode_coinbase_payload.is_none() {
                let payload = hex::decode(payload_hex).map_err(|_| InitError::InvalidHex {
                    field: "extra.masternode.coinbase_payload",
                    value: payload_hex.clone(),
                })?;
                plan.masternode_coinbase_payload = Some(payload);
                // Special transaction type (BIP: masternode coinbase), encoded
                // in the high 16 bits of the transaction version.
                plan.coinbase_version_override = Some(3 | (5 << 16));
            }
        }
        Ok(())
    }

    fn split_datamining(&self, plan: &mut RewardPlan) -> Result<(), InitError> {
        let Some(field) = &self.extra.datamining else {
            return Ok(());
        };
        for target in clone_one_or_many(field) {
            let script = resolve_script(
                "extra.datamining",
                target.address.as_deref(),
                target.script.as_deref(),
                self.network,
            )?;
            if self.features.datamining_is_additive {
                // Intentional deviation: data-mining is a parallel subsidy
                // and does not reduce reward_to_pool.
                plan.outputs.push(RewardOutput {
                    value: target.amount,
                    script_pubkey: script,
                });
            } else {
                plan.reward_to_pool =
                    plan.reward_to_pool
                        .checked_sub(target.amount)
                        .ok_or(InitError::RewardOverdraft {
                            shortfall: target.amount.saturating_sub(plan.reward_to_pool),
                        })?;
                plan.outputs.push(RewardOutput {
                    value: target.amount,
                    script_pubkey: script,
                });
            }
        }
        Ok(())
    }
}

fn clone_one_or_many<T: Clone>(value: &crate::template::OneOrMany<T>) -> Vec<T> {
    match value {
        crate::template::OneOrMany::One(item) => vec![item.clone()],
        crate::template::OneOrMany::Many(items) => items.clone(),
    }
}
