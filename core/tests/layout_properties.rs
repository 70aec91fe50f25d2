//! Geometry properties of the layout engine over a grid of terminal sizes
//! and split ratios.

use deskapp_core::layout::{LayoutEngine, LayoutKey, LayoutPlan, PanelKind, PanelVisibility, SplitRatios};
use pretty_assertions::assert_eq;

const SPLITS: [f64; 6] = [0.0, 0.1, 0.16, 0.2, 0.5, 0.85];

fn splits(h: f64, v: f64, r: f64) -> SplitRatios {
    SplitRatios {
        h_split: h,
        v_split: v,
        r_split: r,
    }
}

fn tiled(plan: &LayoutPlan) -> Vec<(PanelKind, deskapp_core::Region)> {
    plan.iter().filter(|(kind, _)| *kind != PanelKind::Floating).collect()
}

fn assert_tiles_screen(width: u16, height: u16, plan: &LayoutPlan) {
    let regions = tiled(plan);

    for (i, (ka, a)) in regions.iter().enumerate() {
        assert!(
            u32::from(a.x) + u32::from(a.width) <= u32::from(width)
                && u32::from(a.y) + u32::from(a.height) <= u32::from(height),
            "{ka:?} {a:?} leaves a {width}x{height} screen"
        );
        for (kb, b) in &regions[i + 1..] {
            assert!(!a.intersects(b), "{ka:?} {a:?} overlaps {kb:?} {b:?}");
        }
    }

    let covered: u32 = regions.iter().map(|(_, r)| r.area()).sum();
    assert_eq!(covered, u32::from(width) * u32::from(height), "gaps in {width}x{height}");
}

#[test]
fn test_classic_panels_tile_the_screen() {
    let vis = PanelVisibility::classic();
    for width in [10u16, 33, 80, 120, 211] {
        for height in [7u16, 24, 40, 61] {
            for h in SPLITS {
                for v in SPLITS {
                    let plan = LayoutPlan::compute(width, height, &vis, &splits(h, v, 0.25));
                    assert_tiles_screen(width, height, &plan);
                }
            }
        }
    }
}

#[test]
fn test_every_panel_tiles_the_screen() {
    let vis = PanelVisibility::all();
    for width in [12u16, 80, 120] {
        for height in [9u16, 24, 40] {
            for h in SPLITS {
                for r in SPLITS {
                    let plan = LayoutPlan::compute(width, height, &vis, &splits(h, 0.16, r));
                    assert_tiles_screen(width, height, &plan);

                    let main = plan.main();
                    if let Some(float) = plan.get(PanelKind::Floating) {
                        assert!(float.x >= main.x && float.y >= main.y);
                        assert!(float.x + float.width <= main.x + main.width);
                        assert!(float.y + float.height <= main.y + main.height);
                    }
                }
            }
        }
    }
}

#[test]
fn test_hidden_panels_give_their_space_to_main() {
    let mut vis = PanelVisibility::classic();
    let full = LayoutPlan::compute(120, 40, &vis, &SplitRatios::default());

    vis.menu = false;
    let no_menu = LayoutPlan::compute(120, 40, &vis, &SplitRatios::default());
    assert!(no_menu.get(PanelKind::Menu).is_none());
    assert_eq!(no_menu.main().width, 120);
    assert_eq!(no_menu.main().height, full.main().height);

    vis.messages = false;
    vis.header = false;
    vis.footer = false;
    let bare = LayoutPlan::compute(120, 40, &vis, &SplitRatios::default());
    assert_eq!(bare.main().dims(), (40, 120, 0, 0));
}

#[test]
fn test_menu_grows_and_main_shrinks_with_h_split() {
    let vis = PanelVisibility::classic();
    let mut last: Option<(u16, u16)> = None;

    for step in 0..=17 {
        let h = f64::from(step) * 0.05;
        let plan = LayoutPlan::compute(120, 40, &vis, &splits(h, 0.16, 0.25));
        let menu_w = plan.get(PanelKind::Menu).map(|r| r.width).unwrap_or(0);
        let main_w = plan.main().width;

        if let Some((prev_menu, prev_main)) = last {
            assert!(menu_w > prev_menu, "menu width did not grow at h_split {h}");
            assert!(main_w < prev_main, "main width did not shrink at h_split {h}");
        }
        last = Some((menu_w, main_w));
    }
}

#[test]
fn test_recompute_is_stable() {
    let key = LayoutKey {
        width: 97,
        height: 31,
        visibility: PanelVisibility::all(),
        splits: splits(0.23, 0.17, 0.31),
    };

    let mut engine = LayoutEngine::new();
    assert!(engine.refresh(key));
    let first = *engine.plan();

    assert!(!engine.refresh(key));
    engine.mark_dirty();
    assert!(engine.refresh(key));
    assert_eq!(*engine.plan(), first);
    assert_eq!(engine.passes(), 2);
}

#[test]
fn test_reference_terminal() {
    let plan = LayoutPlan::compute(120, 40, &PanelVisibility::classic(), &splits(0.2, 0.16, 0.25));

    assert_eq!(plan.get(PanelKind::Header).map(|r| r.dims()), Some((3, 120, 0, 0)));
    assert_eq!(plan.get(PanelKind::Footer).map(|r| r.dims()), Some((3, 120, 37, 0)));
    assert_eq!(plan.get(PanelKind::Menu).map(|r| r.width), Some(24));
    assert_eq!(plan.get(PanelKind::Messages).map(|r| r.height), Some(5));
    assert_eq!(plan.main().height, 29);
    assert_eq!(plan.main().width, 96);
}
