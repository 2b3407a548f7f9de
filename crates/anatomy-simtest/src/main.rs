//! Anatomy Headless Harness
//!
//! Builds creatures from the shared template data and drives them through
//! dismemberment, stance and replication scenarios. Runs entirely
//! in-process, no host engine, no networking, no rendering.
//!
//! Usage:
//!   cargo run -p anatomy-simtest
//!   cargo run -p anatomy-simtest -- --verbose
//!   RUST_LOG=debug cargo run -p anatomy-simtest

use std::collections::BTreeMap;

use anatomy_core::prelude::*;
use anatomy_core::replication;
use anatomy_core::systems::{body_children, body_organs, functional_legs};
use hecs::{Entity, World};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

// ── Creature templates (same JSON a host game would ship) ───────────────
const CREATURES_JSON: &str = include_str!("../../../data/creatures.json");

#[derive(Debug, Deserialize)]
struct CreatureTemplate {
    name: String,
    required_legs: u32,
    #[serde(default)]
    skin: Option<Color>,
    root: SlotTemplate,
}

#[derive(Debug, Deserialize)]
struct SlotTemplate {
    id: String,
    #[serde(default)]
    accepts: Option<PartType>,
    #[serde(default)]
    part: Option<PartTemplate>,
}

#[derive(Debug, Deserialize)]
struct PartTemplate {
    part_type: PartType,
    #[serde(default)]
    vital: bool,
    #[serde(default)]
    symmetry: Symmetry,
    #[serde(default)]
    incisable: bool,
    #[serde(default)]
    endo_skeleton: bool,
    #[serde(default)]
    speed: Option<MovementSpeedModifier>,
    #[serde(default)]
    organs: Vec<String>,
    #[serde(default)]
    slots: Vec<SlotTemplate>,
}

/// A spawned creature. Parts are keyed by their slot path, e.g.
/// `torso/left leg/left foot`.
struct Creature {
    body: Entity,
    parts: BTreeMap<String, Entity>,
    organs: Vec<Entity>,
}

impl Creature {
    fn part(&self, path: &str) -> Result<Entity, String> {
        self.parts
            .get(path)
            .copied()
            .ok_or_else(|| format!("template has no part at '{}'", path))
    }

    /// Look up several parts at once, failing on the first missing path
    fn find_parts<const N: usize>(&self, paths: [&str; N]) -> Result<[Entity; N], String> {
        let found = paths
            .iter()
            .map(|path| self.part(path))
            .collect::<Result<Vec<_>, _>>()?;
        found
            .try_into()
            .map_err(|_| "part lookup lost an entry".to_string())
    }
}

fn spawn_part(
    system: &mut BodySystem,
    template: &PartTemplate,
    path: &str,
    creature: &mut Creature,
) -> Result<Entity, BodyError> {
    let mut part = BodyPart::new(template.part_type).with_symmetry(template.symmetry);
    part.is_vital = template.vital;
    part.incisable = template.incisable;
    part.endo_skeleton = template.endo_skeleton;
    let entity = system.spawn_part(part);
    creature.parts.insert(path.to_string(), entity);

    if let Some(speed) = template.speed {
        let _ = system.world_mut().insert_one(entity, speed);
    }
    for organ_id in &template.organs {
        system.create_organ_slot(entity, organ_id)?;
        let organ = system.spawn_organ();
        system.insert_organ(organ, entity, organ_id)?;
        creature.organs.push(organ);
    }
    for slot in &template.slots {
        let slot_ref = system.create_slot(entity, &slot.id, slot.accepts)?;
        if let Some(child) = &slot.part {
            let child_path = format!("{}/{}", path, slot.id);
            let child = spawn_part(system, child, &child_path, creature)?;
            system.attach(child, &slot_ref)?;
        }
    }
    Ok(entity)
}

fn build(system: &mut BodySystem, template: &CreatureTemplate) -> Result<Creature, BodyError> {
    let body = system.spawn_body(Some(template.required_legs));
    if let Some(skin) = template.skin {
        let _ = system
            .world_mut()
            .insert_one(body, HumanoidAppearance { skin_color: skin });
    }
    let mut creature = Creature {
        body,
        parts: BTreeMap::new(),
        organs: Vec::new(),
    };

    let root = system.create_slot(body, &template.root.id, template.root.accepts)?;
    if let Some(part) = &template.root.part {
        let entity = spawn_part(system, part, &template.root.id, &mut creature)?;
        system.attach(entity, &root)?;
    }
    log::info!(
        "built {} with {} parts and {} organs",
        template.name,
        creature.parts.len(),
        creature.organs.len()
    );
    Ok(creature)
}

fn load_templates() -> Result<Vec<CreatureTemplate>, serde_json::Error> {
    serde_json::from_str(CREATURES_JSON)
}

fn fresh_system() -> BodySystem {
    let config = BodyConfig {
        seed: Some(0x5eed),
        ..Default::default()
    };
    BodySystem::with_config(config, Collaborators::default())
}

/// Spawn the named creature into a fresh system
fn spawn_creature(name: &str) -> Result<(BodySystem, Creature), String> {
    let templates = load_templates().map_err(|e| format!("JSON parse error: {}", e))?;
    let template = templates
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| format!("no template named {}", name))?;
    let mut system = fresh_system();
    let creature = build(&mut system, template).map_err(|e| e.to_string())?;
    Ok((system, creature))
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

fn walk_speed(system: &BodySystem, body: Entity) -> f32 {
    system
        .movement_speed(body)
        .map_or(f32::NAN, |m| m.base_walk_speed)
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: String) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail,
    }
}

fn setup_failure(name: &str, error: String) -> Vec<TestResult> {
    vec![check(name, false, error)]
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(true)
        .init();

    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== Anatomy Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Creature templates
    results.extend(validate_templates(verbose));

    // 2. Stance under foot loss
    results.extend(validate_stance(verbose));

    // 3. Locomotion leg-loss sweep
    results.extend(validate_locomotion(verbose));

    // 4. Dismemberment and organ survival
    results.extend(validate_dismemberment(verbose));

    // 5. Surgery surface flags
    results.extend(validate_surgery(verbose));

    // 6. Authority → observer replication
    results.extend(validate_replication(verbose));

    // 7. Configuration parsing
    results.extend(validate_config(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Templates ────────────────────────────────────────────────────────

fn validate_templates(verbose: bool) -> Vec<TestResult> {
    println!("--- Creature Templates ---");
    let mut results = Vec::new();

    let templates = match load_templates() {
        Ok(t) => t,
        Err(e) => return setup_failure("templates_parse", format!("JSON parse error: {}", e)),
    };
    results.push(check(
        "templates_not_empty",
        !templates.is_empty(),
        format!("{} creature templates loaded", templates.len()),
    ));

    for template in &templates {
        let mut system = fresh_system();
        let creature = match build(&mut system, template) {
            Ok(c) => c,
            Err(e) => {
                results.push(check(
                    &format!("{}_build", template.name),
                    false,
                    e.to_string(),
                ));
                continue;
            }
        };
        let body = creature.body;

        let reachable: Vec<Entity> = body_children(system.world(), body).collect();
        results.push(check(
            &format!("{}_all_parts_reachable", template.name),
            reachable.len() == creature.parts.len(),
            format!("{}/{} parts reachable from root", reachable.len(), creature.parts.len()),
        ));

        let wrong_body = creature
            .parts
            .values()
            .filter(|p| system.part(**p).map_or(true, |p| p.body != Some(body)))
            .count();
        results.push(check(
            &format!("{}_body_propagated", template.name),
            wrong_body == 0,
            format!("{} parts with the wrong body", wrong_body),
        ));

        let organs = body_organs(system.world(), body).count();
        results.push(check(
            &format!("{}_organs_bound", template.name),
            organs == creature.organs.len(),
            format!("{} organs in body", organs),
        ));

        let legs = functional_legs(system.world(), body).len() as u32;
        results.push(check(
            &format!("{}_standing", template.name),
            system.stance(body) == Some(Stance::Standing) && legs == template.required_legs,
            format!("{:?} on {} functional legs", system.stance(body), legs),
        ));

        if verbose {
            println!(
                "  {}: walk {:.2}, {} parts, {} organs",
                template.name,
                walk_speed(&system, body),
                creature.parts.len(),
                creature.organs.len()
            );
        }
    }

    results
}

// ── 2. Stance ───────────────────────────────────────────────────────────

fn validate_stance(_verbose: bool) -> Vec<TestResult> {
    println!("--- Stance ---");
    let mut results = Vec::new();

    let (mut system, creature) = match spawn_creature("humanoid") {
        Ok(c) => c,
        Err(e) => return setup_failure("stance_setup", e),
    };
    let body = creature.body;
    let [left_foot, right_foot, right_leg] = match creature.find_parts([
        "torso/left leg/left foot",
        "torso/right leg/right foot",
        "torso/right leg",
    ]) {
        Ok(p) => p,
        Err(e) => return setup_failure("stance_setup", e),
    };
    let sub = system.events.subscribe();

    let _ = system.detach(left_foot);
    results.push(check(
        "stance_one_foot_keeps_standing",
        system.stance(body) == Some(Stance::Standing),
        format!("{:?} after losing the left foot", system.stance(body)),
    ));
    results.push(check(
        "stance_one_foot_halves_speed",
        approx(walk_speed(&system, body), 1.25),
        format!("walk {:.2}", walk_speed(&system, body)),
    ));

    let _ = system.detach(right_foot);
    results.push(check(
        "stance_no_feet_falls",
        system.stance(body) == Some(Stance::Fallen),
        format!("{:?} after losing both feet", system.stance(body)),
    ));

    let slot = SlotRef::new(right_leg, "right foot");
    let reattached = system.attach(right_foot, &slot);
    results.push(check(
        "stance_reattach_stands",
        reattached.is_ok() && system.stance(body) == Some(Stance::Standing),
        format!("{:?} after reattaching ({:?})", system.stance(body), reattached),
    ));

    let changes = system
        .events
        .drain(sub)
        .into_iter()
        .filter(|e| matches!(e, BodyEvent::StanceChanged { .. }))
        .count();
    results.push(check(
        "stance_events",
        changes == 2,
        format!("{} stance changes published", changes),
    ));

    results
}

// ── 3. Locomotion ───────────────────────────────────────────────────────

fn validate_locomotion(verbose: bool) -> Vec<TestResult> {
    println!("--- Locomotion ---");
    let mut results = Vec::new();

    let (mut system, creature) = match spawn_creature("quadruped") {
        Ok(c) => c,
        Err(e) => return setup_failure("locomotion_setup", e),
    };
    let legs = match creature.find_parts([
        "torso/front left leg",
        "torso/front right leg",
        "torso/hind left leg",
        "torso/hind right leg",
    ]) {
        Ok(p) => p,
        Err(e) => return setup_failure("locomotion_setup", e),
    };
    let tail = match creature.part("torso/tail") {
        Ok(p) => p,
        Err(e) => return setup_failure("locomotion_setup", e),
    };
    let body = creature.body;
    results.push(check(
        "locomotion_full_speed",
        approx(walk_speed(&system, body), 3.0),
        format!("walk {:.2} on four legs", walk_speed(&system, body)),
    ));

    let mut sweep_ok = true;
    for (removed, leg) in legs.iter().enumerate() {
        let _ = system.detach(*leg);
        let remaining = (legs.len() - removed - 1) as f32;
        let expected = 3.0 * remaining / 4.0;
        let walk = walk_speed(&system, body);
        if verbose {
            println!("  {} legs left: walk {:.2} (expected {:.2})", remaining, walk, expected);
        }
        sweep_ok &= approx(walk, expected);
    }
    results.push(check(
        "locomotion_leg_loss_sweep",
        sweep_ok,
        "speed drops by a quarter per lost leg".into(),
    ));
    results.push(check(
        "locomotion_legless_falls",
        system.stance(body) == Some(Stance::Fallen),
        format!("{:?} with no legs", system.stance(body)),
    ));

    // A leg in a wildcard slot holds the body up but adds no speed
    let stray = legs[0];
    let placed = system.create_slot_and_attach(tail, "graft", stray);
    results.push(check(
        "locomotion_wildcard_leg",
        placed.is_ok()
            && system.stance(body) == Some(Stance::Standing)
            && approx(walk_speed(&system, body), 0.0),
        format!(
            "{:?}, walk {:.2}",
            system.stance(body),
            walk_speed(&system, body)
        ),
    ));

    results
}

// ── 4. Dismemberment ────────────────────────────────────────────────────

fn validate_dismemberment(_verbose: bool) -> Vec<TestResult> {
    println!("--- Dismemberment ---");
    let mut results = Vec::new();

    let (mut system, creature) = match spawn_creature("humanoid") {
        Ok(c) => c,
        Err(e) => return setup_failure("dismemberment_setup", e),
    };
    let body = creature.body;
    let [left_arm, left_hand, head, right_arm, right_hand] = match creature.find_parts([
        "torso/left arm",
        "torso/left arm/left hand",
        "torso/head",
        "torso/right arm",
        "torso/right arm/right hand",
    ]) {
        Ok(p) => p,
        Err(e) => return setup_failure("dismemberment_setup", e),
    };

    let _ = system.orphan(left_arm);
    let arm = system.part(left_arm);
    let hand = system.part(left_hand);
    results.push(check(
        "orphan_detaches_children",
        arm.as_ref().map_or(false, |a| a.parent_slot.is_none())
            && hand.as_ref().map_or(false, |h| h.parent_slot.is_none()),
        "arm and hand both loose".into(),
    ));
    results.push(check(
        "orphan_keeps_provenance",
        arm.as_ref().and_then(|a| a.original_body) == Some(body),
        format!("original body {:?}", arm.and_then(|a| a.original_body)),
    ));
    let skin = system.world().get::<&PartAppearance>(left_arm).ok().map(|a| *a);
    results.push(check(
        "detached_part_keeps_skin",
        skin.map_or(false, |a| a.original_body == Some(body)),
        format!("{:?}", skin),
    ));

    let head_organs: Vec<Entity> = anatomy_core::systems::part_organs(system.world(), head).collect();
    let sub = system.events.subscribe();
    let deleted = system.delete_part(head);
    let loose = head_organs
        .iter()
        .filter(|o| system.organ(**o).map_or(false, |o| o.body.is_none()))
        .count();
    results.push(check(
        "delete_releases_organs",
        deleted && system.part(head).is_none() && loose == head_organs.len(),
        format!("{}/{} organs survived unbound", loose, head_organs.len()),
    ));
    let removed = system
        .events
        .drain(sub)
        .iter()
        .filter(|e| matches!(e, BodyEvent::OrganRemovedFromBody { .. }))
        .count();
    results.push(check(
        "delete_notifies_organs",
        removed == head_organs.len(),
        format!("{} organ removal events", removed),
    ));

    let deleted = system.delete_part_recursive(right_arm);
    results.push(check(
        "recursive_delete",
        deleted && system.part(right_arm).is_none() && system.part(right_hand).is_none(),
        "arm and hand destroyed".into(),
    ));

    results
}

// ── 5. Surgery ──────────────────────────────────────────────────────────

fn validate_surgery(_verbose: bool) -> Vec<TestResult> {
    println!("--- Surgery ---");
    let mut results = Vec::new();

    let (mut system, creature) = match spawn_creature("humanoid") {
        Ok(c) => c,
        Err(e) => return setup_failure("surgery_setup", e),
    };
    let [torso, left_leg, foot] = match creature.find_parts([
        "torso",
        "torso/left leg",
        "torso/left leg/left foot",
    ]) {
        Ok(p) => p,
        Err(e) => return setup_failure("surgery_setup", e),
    };

    let steps = [
        system.set_part_incised(torso, true),
        system.set_part_opened(torso, true),
        system.set_endo_opened(torso, true),
    ];
    results.push(check(
        "surgery_open_torso",
        steps.iter().all(|s| *s == Ok(true)),
        format!("{:?}", steps),
    ));
    results.push(check(
        "surgery_requires_incisable",
        system.set_part_incised(foot, true) == Ok(false),
        "foot cannot be incised".into(),
    ));

    let stump = SlotRef::new(left_leg, "left foot");
    let _ = system.detach(foot);
    results.push(check(
        "surgery_cauterize_stump",
        system.set_slot_cauterized(&stump, true) == Ok(true)
            && system.slot(&stump).map_or(false, |s| s.cauterized),
        "stump cauterized".into(),
    ));

    results
}

// ── 6. Replication ──────────────────────────────────────────────────────

fn mirror_matches(system: &BodySystem, mirror: &World, parts: &BTreeMap<String, Entity>) -> usize {
    parts
        .values()
        .filter(|p| {
            let authority = system.part(**p);
            let observed = mirror.get::<&BodyPart>(**p).ok().map(|b| (*b).clone());
            authority == observed
        })
        .count()
}

fn validate_replication(_verbose: bool) -> Vec<TestResult> {
    println!("--- Replication ---");
    let mut results = Vec::new();

    let (mut system, creature) = match spawn_creature("humanoid") {
        Ok(c) => c,
        Err(e) => return setup_failure("replication_setup", e),
    };
    let right_leg = match creature.part("torso/right leg") {
        Ok(p) => p,
        Err(e) => return setup_failure("replication_setup", e),
    };

    // The observer allocates the same entity ids as the authority
    let mut mirror = World::new();
    for _ in 0..system.world().len() {
        mirror.spawn(());
    }

    let first = system
        .sync_encoded()
        .and_then(|bytes| replication::decode(&bytes));
    match first {
        Ok(payload) => {
            let count = payload.updates.len();
            let applied = replication::apply_payload(&mut mirror, payload);
            results.push(check(
                "replication_initial_sync",
                applied == count,
                format!("{}/{} updates applied", applied, count),
            ));
        }
        Err(e) => results.push(check("replication_initial_sync", false, e.to_string())),
    }
    let matching = mirror_matches(&system, &mirror, &creature.parts);
    results.push(check(
        "replication_mirror_equal",
        matching == creature.parts.len(),
        format!("{}/{} parts identical", matching, creature.parts.len()),
    ));

    let _ = system.detach(right_leg);
    let delta = system.sync();
    let delta_len = delta.updates.len();
    replication::apply_payload(&mut mirror, delta);
    let matching = mirror_matches(&system, &mirror, &creature.parts);
    results.push(check(
        "replication_delta",
        matching == creature.parts.len() && delta_len < creature.parts.len(),
        format!("{} updates in delta, {} parts identical", delta_len, matching),
    ));

    let corrupt = replication::decode(&[0xde, 0xad]);
    results.push(check(
        "replication_rejects_garbage",
        corrupt.is_err(),
        format!("{:?}", corrupt.err().map(|e| e.to_string())),
    ));

    results
}

// ── 7. Configuration ────────────────────────────────────────────────────

fn validate_config(_verbose: bool) -> Vec<TestResult> {
    println!("--- Configuration ---");

    let partial = BodyConfig::from_json(r#"{ "default_required_legs": 4, "seed": 9 }"#);
    let invalid = BodyConfig::from_json(r#"{ "drop_offset": -2.0 }"#);
    let garbage = BodyConfig::from_json("not json");

    vec![
        check(
            "config_partial_defaults",
            partial.as_ref().map_or(false, |c| {
                c.default_required_legs == 4 && c.container_id == "body_part"
            }),
            format!("{:?}", partial),
        ),
        check(
            "config_rejects_negative_offset",
            invalid.is_err(),
            format!("{:?}", invalid.err().map(|e| e.to_string())),
        ),
        check(
            "config_rejects_garbage",
            garbage.is_err(),
            "non-JSON input refused".into(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_part_path_is_an_error() {
        let mut world = World::new();
        let torso = world.spawn(());
        let creature = Creature {
            body: world.spawn(()),
            parts: BTreeMap::from([("torso".to_string(), torso)]),
            organs: Vec::new(),
        };

        assert_eq!(creature.part("torso"), Ok(torso));
        assert!(creature.part("torso/tail").is_err());
        assert_eq!(creature.find_parts(["torso"]), Ok([torso]));
        assert!(creature.find_parts(["torso", "torso/wing"]).is_err());
    }
}
