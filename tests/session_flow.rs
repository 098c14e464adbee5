use std::rc::Rc;

use cvisiontool::actions::{Action, ColorSpace, InRangeParams, MorphParams, MorphShape};
use cvisiontool::io::{load_recipe_actions, save_image, save_recipe};
use cvisiontool::ops::Mat;
use cvisiontool::processor::ActionProcessor;
use cvisiontool::session::Session;
use image::Rgb;

fn red_square() -> Mat {
    Mat::from_fn(32, 32, |x, y| {
        if (8..24).contains(&x) && (8..24).contains(&y) {
            Rgb([220, 20, 20])
        } else {
            Rgb([20, 20, 200])
        }
    })
}

#[test]
fn open_apply_export_and_replay() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("square.png");
    save_image(&red_square(), &image_path).unwrap();

    let mut session = Session::open(&image_path).unwrap();
    assert_eq!(session.name, "square.png");

    session
        .apply(Action::InRange(InRangeParams {
            color_space: ColorSpace::Hsv,
            lower: [0, 100, 100],
            upper: [10, 255, 255],
        }))
        .unwrap();
    session
        .apply(Action::Erosion(MorphParams::new(MorphShape::Rect, 2)))
        .unwrap();

    // Eroding a 16px mask by a 5x5 rect leaves a 12px square.
    let white = session
        .current_image()
        .pixels()
        .filter(|p| **p == Rgb([255, 255, 255]))
        .count();
    assert_eq!(white, 12 * 12);

    let recipe_path = dir.path().join("recipe.json");
    save_recipe(&session.recipe(), &recipe_path).unwrap();
    let actions = load_recipe_actions(&recipe_path).unwrap();
    assert_eq!(actions.len(), 2);

    let processor = ActionProcessor::new();
    let mut replayed = red_square();
    for action in &actions {
        replayed = processor.process(action, &replayed).unwrap();
    }
    assert_eq!(&replayed, session.current_image());
}

#[test]
fn revert_then_continue_branches_from_the_target() {
    let mut session = Session::from_image("square", red_square());
    let first = session
        .apply(Action::Dilation(MorphParams::new(MorphShape::Cross, 1)))
        .unwrap();
    session
        .apply(Action::Dilation(MorphParams::new(MorphShape::Cross, 1)))
        .unwrap();

    assert!(session.revert_to(&first));
    let next = session
        .apply(Action::Erosion(MorphParams::new(MorphShape::Ellipse, 1)))
        .unwrap();

    let entries = session.history.list_newest_first();
    assert_eq!(entries.len(), 3);
    assert!(Rc::ptr_eq(&entries[0], &next));
    assert!(Rc::ptr_eq(&entries[1], &first));
    assert!(entries[2].action().is_image_loaded());
}

#[test]
fn preview_never_reaches_history_or_recipe() {
    let mut session = Session::from_image("square", red_square());
    session
        .preview(&Action::MorphGradient(MorphParams::new(MorphShape::Rect, 1)))
        .unwrap();
    assert!(session.has_preview());
    assert!(session.recipe().is_empty());
    assert_eq!(session.history.len(), 1);
}
