use qwop_core::rng::SeededRng;
use qwop_core::skeleton::BodyPart;
use qwop_core::QwopEnv;
use serde::Serialize;

/// Chooses one discrete action per env step.
pub trait Policy {
    fn id(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn reset(&mut self, seed: u32);
    /// `None` ends the run early.
    fn next_action(&mut self, env: &QwopEnv) -> Option<usize>;
}

#[derive(Clone, Debug, Serialize)]
pub struct PolicyManifestEntry {
    pub id: String,
    pub family: String,
    pub description: String,
}

fn label_action(env: &QwopEnv, label: &str) -> usize {
    env.mapper().action_from_label(label).unwrap_or(0)
}

struct IdlePolicy;

impl Policy for IdlePolicy {
    fn id(&self) -> &'static str {
        "idle"
    }

    fn description(&self) -> &'static str {
        "Holds no keys; the runner keeps its spawn stance."
    }

    fn reset(&mut self, _seed: u32) {}

    fn next_action(&mut self, _env: &QwopEnv) -> Option<usize> {
        Some(0)
    }
}

struct KneeDropPolicy;

impl Policy for KneeDropPolicy {
    fn id(&self) -> &'static str {
        "knee-drop"
    }

    fn description(&self) -> &'static str {
        "Holds O until the runner folds onto the track."
    }

    fn reset(&mut self, _seed: u32) {}

    fn next_action(&mut self, env: &QwopEnv) -> Option<usize> {
        Some(label_action(env, "O"))
    }
}

/// Uniform random actions, each held for a few steps.
struct RandomHoldPolicy {
    rng: SeededRng,
    current: usize,
    remaining: u32,
}

impl RandomHoldPolicy {
    fn new() -> Self {
        Self {
            rng: SeededRng::new(0),
            current: 0,
            remaining: 0,
        }
    }
}

impl Policy for RandomHoldPolicy {
    fn id(&self) -> &'static str {
        "random-hold"
    }

    fn description(&self) -> &'static str {
        "Seeded random action held for 2-7 steps at a time."
    }

    fn reset(&mut self, seed: u32) {
        self.rng = SeededRng::new(seed ^ 0x5EED_0001);
        self.current = 0;
        self.remaining = 0;
    }

    fn next_action(&mut self, env: &QwopEnv) -> Option<usize> {
        if self.remaining == 0 {
            self.current = self.rng.next_index(env.num_actions());
            self.remaining = self.rng.next_range(2, 8);
        }
        self.remaining -= 1;
        Some(self.current)
    }
}

#[derive(Clone, Copy, Debug)]
struct CycleConfig {
    id: &'static str,
    description: &'static str,
    phases: &'static [(&'static str, u32)],
}

const CYCLES: [CycleConfig; 3] = [
    CycleConfig {
        id: "stride-qp-wo",
        description: "Alternates QP and WO, the classic two-phase stride.",
        phases: &[("QP", 6), ("WO", 6)],
    },
    CycleConfig {
        id: "knee-shuffle",
        description: "Alternates the calf keys O and P with thighs relaxed.",
        phases: &[("O", 5), ("P", 5)],
    },
    CycleConfig {
        id: "thigh-swing",
        description: "Alternates Q and W with calves relaxed.",
        phases: &[("Q", 8), ("W", 8)],
    },
];

struct CyclePolicy {
    cfg: CycleConfig,
    phase: usize,
    held: u32,
}

impl Policy for CyclePolicy {
    fn id(&self) -> &'static str {
        self.cfg.id
    }

    fn description(&self) -> &'static str {
        self.cfg.description
    }

    fn reset(&mut self, _seed: u32) {
        self.phase = 0;
        self.held = 0;
    }

    fn next_action(&mut self, env: &QwopEnv) -> Option<usize> {
        let (label, hold) = *self.cfg.phases.get(self.phase)?;
        self.held += 1;
        if self.held >= hold {
            self.held = 0;
            self.phase = (self.phase + 1) % self.cfg.phases.len();
        }
        Some(label_action(env, label))
    }
}

/// Swaps stride phase whenever the trailing foot gets far enough behind.
struct FeetSwitchPolicy {
    left_leads: bool,
    switch_gap: f64,
}

impl Policy for FeetSwitchPolicy {
    fn id(&self) -> &'static str {
        "feet-switch"
    }

    fn description(&self) -> &'static str {
        "Reactive stride: flips between QP and WO from the feet's horizontal gap."
    }

    fn reset(&mut self, _seed: u32) {
        self.left_leads = false;
    }

    fn next_action(&mut self, env: &QwopEnv) -> Option<usize> {
        let left = env.sim().body_state(BodyPart::LeftFoot).x;
        let right = env.sim().body_state(BodyPart::RightFoot).x;
        let gap = if self.left_leads {
            left - right
        } else {
            right - left
        };
        if gap > self.switch_gap {
            self.left_leads = !self.left_leads;
        }
        let label = if self.left_leads { "WO" } else { "QP" };
        Some(label_action(env, label))
    }
}

/// Plays back a fixed action list, then stops.
pub struct ScriptedPolicy {
    actions: Vec<u8>,
    cursor: usize,
}

impl ScriptedPolicy {
    pub fn new(actions: Vec<u8>) -> Self {
        Self { actions, cursor: 0 }
    }
}

impl Policy for ScriptedPolicy {
    fn id(&self) -> &'static str {
        "script"
    }

    fn description(&self) -> &'static str {
        "Fixed action list loaded from a script file."
    }

    fn reset(&mut self, _seed: u32) {
        self.cursor = 0;
    }

    fn next_action(&mut self, _env: &QwopEnv) -> Option<usize> {
        let action = *self.actions.get(self.cursor)?;
        self.cursor += 1;
        Some(action as usize)
    }
}

pub fn policy_ids() -> Vec<&'static str> {
    let mut ids = vec!["idle", "knee-drop", "random-hold", "feet-switch"];
    ids.extend(CYCLES.iter().map(|cfg| cfg.id));
    ids
}

pub fn create_policy(id: &str) -> Option<Box<dyn Policy>> {
    match id {
        "idle" => Some(Box::new(IdlePolicy)),
        "knee-drop" => Some(Box::new(KneeDropPolicy)),
        "random-hold" => Some(Box::new(RandomHoldPolicy::new())),
        "feet-switch" => Some(Box::new(FeetSwitchPolicy {
            left_leads: false,
            switch_gap: 0.6,
        })),
        _ => CYCLES
            .iter()
            .find(|cfg| cfg.id == id)
            .map(|cfg| -> Box<dyn Policy> {
                Box::new(CyclePolicy {
                    cfg: *cfg,
                    phase: 0,
                    held: 0,
                })
            }),
    }
}

pub fn describe_policies() -> Vec<(&'static str, &'static str)> {
    policy_ids()
        .into_iter()
        .filter_map(|id| create_policy(id).map(|policy| (id, policy.description())))
        .collect()
}

pub fn policy_manifest_entries() -> Vec<PolicyManifestEntry> {
    describe_policies()
        .into_iter()
        .map(|(id, description)| PolicyManifestEntry {
            id: id.to_string(),
            family: policy_family(id).to_string(),
            description: description.to_string(),
        })
        .collect()
}

fn policy_family(id: &str) -> &'static str {
    match id {
        "idle" | "knee-drop" => "baseline",
        "random-hold" => "random",
        "feet-switch" => "reactive",
        _ => "cycle",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qwop_core::EnvConfig;

    fn env(reduced: bool) -> QwopEnv {
        let mut env = QwopEnv::new(EnvConfig {
            reduced_action_set: reduced,
            ..EnvConfig::default()
        })
        .unwrap();
        env.reset(1);
        env
    }

    #[test]
    fn every_listed_policy_can_be_created() {
        for id in policy_ids() {
            let policy = create_policy(id).unwrap_or_else(|| panic!("missing policy {id}"));
            assert_eq!(policy.id(), id);
        }
        assert!(create_policy("moonwalk").is_none());
    }

    #[test]
    fn random_hold_is_reproducible_and_in_range() {
        let env = env(true);
        let mut a = create_policy("random-hold").unwrap();
        let mut b = create_policy("random-hold").unwrap();
        a.reset(77);
        b.reset(77);
        for _ in 0..50 {
            let (x, y) = (a.next_action(&env).unwrap(), b.next_action(&env).unwrap());
            assert_eq!(x, y);
            assert!(x < env.num_actions());
        }
    }

    #[test]
    fn cycle_labels_exist_in_both_action_sets() {
        for reduced in [false, true] {
            let env = env(reduced);
            for cfg in CYCLES {
                for (label, _) in cfg.phases {
                    assert!(
                        env.mapper().action_from_label(label).is_some(),
                        "{label} missing (reduced={reduced})"
                    );
                }
            }
        }
    }

    #[test]
    fn cycle_advances_after_hold() {
        let env = env(false);
        let mut policy = create_policy("stride-qp-wo").unwrap();
        policy.reset(0);
        let actions: Vec<usize> = (0..12).filter_map(|_| policy.next_action(&env)).collect();
        let qp = env.mapper().action_from_label("QP").unwrap();
        let wo = env.mapper().action_from_label("WO").unwrap();
        assert!(actions[..6].iter().all(|a| *a == qp));
        assert!(actions[6..].iter().all(|a| *a == wo));
    }

    #[test]
    fn scripted_policy_stops_at_end() {
        let env = env(true);
        let mut policy = ScriptedPolicy::new(vec![3, 1]);
        assert_eq!(policy.next_action(&env), Some(3));
        assert_eq!(policy.next_action(&env), Some(1));
        assert_eq!(policy.next_action(&env), None);
        policy.reset(0);
        assert_eq!(policy.next_action(&env), Some(3));
    }
}
