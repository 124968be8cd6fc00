//! End-to-end scenarios through the public API.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use fissura::complex::{BuildComplex, CellState, NeighborRef};
use fissura::fracture::Fracture;
use fissura::geometry::Container;
use fissura::links::{ConstantField, LinkKey, NoiseField};
use fissura::math::Point3;
use fissura::sim::{InfiltrationSimulation, SimConfig};

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}

fn p(x: f64, y: f64, z: f64) -> Point3 {
    Point3::new(x, y, z)
}

fn build(points: Vec<Point3>, min: Point3, max: Point3) -> Fracture {
    let container = Container::from_aabb(min, max).unwrap();
    Fracture::build(&BuildComplex::new(points, container), NoiseField::default()).unwrap()
}

fn pair() -> Fracture {
    build(
        vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0)],
        p(-2.0, -2.0, -2.0),
        p(3.0, 2.0, 2.0),
    )
}

/// 27 jittered generators, one per unit cell of a 3x3x3 block.
fn jittered_block(seed: u64) -> Fracture {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut points = Vec::new();
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                points.push(p(
                    f64::from(i) + rng.gen_range(0.2..0.8),
                    f64::from(j) + rng.gen_range(0.2..0.8),
                    f64::from(k) + rng.gen_range(0.2..0.8),
                ));
            }
        }
    }
    build(points, p(0.0, 0.0, 0.0), p(3.0, 3.0, 3.0))
}

#[test]
fn single_point_in_a_cube() {
    init_tracing();
    let f = build(vec![p(0.0, 0.0, 0.0)], p(-1.0, -1.0, -1.0), p(1.0, 1.0, 1.0));
    assert_eq!(f.complex().len(), 1);
    assert_eq!(f.links().external().len(), 6);
    assert_eq!(f.links().internal().len(), 0);
    assert_eq!(f.component_count(), 1);
}

#[test]
fn two_points_share_one_internal_link() {
    init_tracing();
    let f = pair();
    assert_eq!(f.complex().found_cells().count(), 2);
    assert_eq!(f.links().internal().len(), 1);
    let id = f.links().internal()[0];
    assert_eq!(f.links().link(id).unwrap().key(), LinkKey::new(0, 1));
    for cell in 0..2 {
        assert!(f
            .links()
            .links_of_cell(cell)
            .iter()
            .any(|&l| f.links().link(l).unwrap().is_wall()));
    }
}

#[test]
fn life_exhaustion_alone_does_not_split() {
    init_tracing();
    let mut f = pair();
    let config = SimConfig {
        water_base_cost: 0.0,
        water_link_cost: 0.0,
        step_link_degradation: 10.0,
        max_depth: Some(20),
        ..SimConfig::default()
    };
    let mut sim = InfiltrationSimulation::new(&f, config, 99).unwrap();
    let internal = LinkKey::new(0, 1);

    for _ in 0..500 {
        let out = sim.step(&mut f).unwrap();
        if let Some(change) = out.components {
            assert!(!change.new_split());
        }
        if f.links().link_by_key(internal).unwrap().life() < 0.0 {
            break;
        }
    }
    assert!(f.links().link_by_key(internal).unwrap().life() < 0.0);
    assert_eq!(f.component_count(), 1);
}

#[test]
fn deleting_a_cell_isolates_it() {
    init_tracing();
    let mut f = pair();
    let change = f.mark_deleted(&[0]).unwrap().unwrap();
    assert!(change.new_split());
    assert_eq!(f.component_count(), 2);
    assert_eq!(f.complex().cell(0).unwrap().state(), CellState::Air);
    assert!(f.links().cell_graph().neighbors(0).unwrap().is_empty());
}

#[test]
fn sanitize_twice_changes_nothing() {
    let mut f = jittered_block(3);
    let edges = f.links().cell_graph().edge_count();
    let count = f.component_count();
    assert!(f.sanitize(&BTreeSet::new()).unwrap().is_none());
    assert!(f.sanitize(&BTreeSet::new()).unwrap().is_none());
    assert_eq!(f.links().cell_graph().edge_count(), edges);
    assert_eq!(f.component_count(), count);

    let deleted = BTreeSet::from([13]);
    assert!(f.sanitize(&deleted).unwrap().is_some());
    let edges = f.links().cell_graph().edge_count();
    assert!(f.sanitize(&deleted).unwrap().is_none());
    assert_eq!(f.links().cell_graph().edge_count(), edges);
}

#[test]
fn every_face_has_one_entry_and_every_pair_one_link() {
    let f = jittered_block(5);
    let complex = f.complex();
    let links = f.links();
    let mut pairs = BTreeSet::new();
    for cell in complex.found_cells() {
        let i = cell.index();
        let entries = complex.neighbors_of(i).unwrap();
        assert_eq!(entries.len(), cell.mesh().faces.len());
        for nb in entries {
            if let NeighborRef::Cell(j) = nb {
                let key = LinkKey::new(i64::try_from(i).unwrap(), i64::try_from(j).unwrap());
                assert!(links.link_by_key(key).is_some(), "no link for {key}");
                pairs.insert(key);
            }
        }
    }
    assert_eq!(links.internal().len(), pairs.len());
    for (_, link) in links.iter() {
        let key = link.key();
        if link.is_wall() {
            assert!(key.lo() < 0 && key.hi() >= 0);
        } else {
            assert!(0 <= key.lo() && key.lo() < key.hi());
        }
    }
}

#[test]
fn connected_block_is_one_component_after_reset() {
    let mut f = jittered_block(8);
    let mut sim = InfiltrationSimulation::new(&f, SimConfig::default(), 1).unwrap();
    for _ in 0..20 {
        sim.step(&mut f).unwrap();
    }
    assert_eq!(sim.reset(&mut f, false).unwrap().after, 1);
    assert_eq!(f.component_count(), 1);
}

#[test]
fn backup_then_restore_is_exact() {
    let mut f = jittered_block(13);
    let mut sim = InfiltrationSimulation::new(&f, SimConfig::default(), 2).unwrap();
    sim.reset(&mut f, true).unwrap();
    let links = f.links().snapshot();
    let cells = f.complex().cell_states();

    sim.backup_state(&f);
    sim.restore_state(&mut f).unwrap();
    assert_eq!(f.links().snapshot(), links);
    assert_eq!(f.complex().cell_states(), cells);

    for _ in 0..10 {
        sim.step(&mut f).unwrap();
    }
    f.mark_deleted(&[0, 4]).unwrap();
    sim.restore_state(&mut f).unwrap();
    assert_eq!(f.links().snapshot(), links);
    assert_eq!(f.complex().cell_states(), cells);
    assert_eq!(f.component_count(), 1);
}

#[test]
fn uniform_resistance_still_steps() {
    let container = Container::from_aabb(p(0.0, 0.0, 0.0), p(2.0, 2.0, 2.0)).unwrap();
    let points = vec![p(0.5, 0.5, 0.5), p(1.5, 1.5, 1.5), p(0.5, 1.5, 1.0)];
    let mut f = Fracture::build(&BuildComplex::new(points, container), ConstantField(1.0)).unwrap();
    let mut sim = InfiltrationSimulation::new(&f, SimConfig::default(), 6).unwrap();
    let out = sim.step(&mut f).unwrap();
    assert!(out.entry.is_some());
    assert!(out.depth >= 1);
}
