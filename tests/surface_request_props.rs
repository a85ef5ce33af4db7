// This is free and unencumbered software released into the public domain.

#![cfg(feature = "sim")]

use camera_viewfinder::shared::{
    ControllerState, Size, ViewfinderConfig, ViewfinderController,
    drivers::sim::{SimConfig, SimFramework, SurfaceOutcome},
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn surface_request_matches_display_metrics(width in 1u32..4096, height in 1u32..4096) {
        let display = Size::new(width, height);
        let sim = SimFramework::new(SimConfig::default().with_display(display));
        // Stop at the surface request so no frames are generated.
        sim.set_surface_outcome(SurfaceOutcome::Failed);

        let mut vf = ViewfinderController::new(sim.platform(), ViewfinderConfig::default());
        vf.on_create().unwrap();
        vf.dispatch_pending();

        let requests = sim.surface_requests();
        prop_assert_eq!(requests.len(), 1);
        prop_assert_eq!(requests[0].resolution, display);
        prop_assert!(matches!(vf.state(), ControllerState::Failed(_)));
    }

    #[test]
    fn first_enumerated_camera_is_opened(ids in prop::collection::vec("[a-z0-9]{1,4}", 1..5)) {
        let sim = SimFramework::new(SimConfig::default().with_camera_ids(ids.clone()));
        sim.set_surface_outcome(SurfaceOutcome::Failed);

        let mut vf = ViewfinderController::new(sim.platform(), ViewfinderConfig::default());
        vf.on_create().unwrap();
        vf.dispatch_pending();

        prop_assert_eq!(sim.opened_cameras(), vec![ids[0].clone()]);
    }
}
