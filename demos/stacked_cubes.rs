//! Mate a lid onto a base cube and print the committed placements.
//!
//! Run with `cargo run --example stacked_cubes`.

use mate_solver::{
    Assembly, AssemblySolver, ConstraintKind, ConstraintSet, FeatureRef, GeometryKernel, Pose,
    PrimitiveKernel, init_logger,
};

fn main() {
    init_logger();

    let mut kernel = PrimitiveKernel::new();
    let base = kernel.add_box(2.0, 2.0, 1.0);
    let lid = kernel.add_box(2.0, 2.0, 0.2);

    let mut assembly = Assembly::new();
    assembly
        .add_part("", "base", base, Pose::identity())
        .expect("add base");
    assembly
        .add_part(
            "",
            "lid",
            lid,
            Pose::from_translation_euler(3.0, 2.0, 4.0, 0.4, 0.1, 0.0),
        )
        .expect("add lid");

    let mut constraints = ConstraintSet::new();
    constraints
        .add(
            &assembly,
            ConstraintKind::Plane,
            FeatureRef::new("lid", "bottom"),
            FeatureRef::new("base", "top"),
        )
        .expect("declare plane mate");

    let report = AssemblySolver::new()
        .solve(&mut assembly, &kernel, &constraints)
        .expect("solve");

    println!(
        "solve {}: cost {:.3e} -> {:.3e} in {} iterations ({:?})",
        report.status, report.initial_cost, report.final_cost, report.iterations, report.elapsed
    );

    for path in ["base", "lid"] {
        let node = assembly.resolve(path).expect("resolve part");
        let world = assembly.world_pose(node).expect("world pose");
        let located = kernel.apply_pose(assembly.shape(node).unwrap().unwrap(), &world);
        println!("{path}: {world} -> {:?}", located.shape);
    }
}
