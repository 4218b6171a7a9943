use super::*;

fn reference_surface() -> HeadlessSurface {
    let mut surface = HeadlessSurface::with_base_style([
        (StyleProperty::Width, "480px"),
        (StyleProperty::Height, "320px"),
        (StyleProperty::MaxWidth, "100%"),
        (StyleProperty::MaxHeight, "400px"),
        (StyleProperty::ObjectFit, "contain"),
        (StyleProperty::BorderRadius, "10px"),
        (StyleProperty::BoxShadow, "rgba(0, 0, 0, 0.1) 0px 5px 15px 0px"),
        (StyleProperty::Position, "relative"),
        (StyleProperty::Transform, "none"),
        (StyleProperty::Top, "0px"),
        (StyleProperty::Left, "0px"),
    ]);
    surface.set_visible(true);
    surface
}

#[test]
fn synchronize_copies_every_synced_property() {
    let reference = reference_surface();
    let mut target = HeadlessSurface::with_base_style([
        (StyleProperty::Width, "4000px"),
        (StyleProperty::Height, "3000px"),
    ]);

    let copied = PresentationSynchronizer::default().synchronize(&reference, &mut target);

    assert_eq!(copied, SYNCED_PROPERTIES.len());
    for property in SYNCED_PROPERTIES {
        assert_eq!(
            target.computed_style(property),
            reference.computed_style(property),
            "{property} differs"
        );
    }
}

#[test]
fn stale_overrides_are_cleared_before_copying() {
    let mut reference = HeadlessSurface::with_base_style([(StyleProperty::Width, "200px")]);
    reference.set_visible(true);

    let mut target = HeadlessSurface::default();
    target.set_style_override(StyleProperty::Transform, Some("scale(2)".into()));
    target.set_style_override(StyleProperty::Width, Some("999px".into()));

    PresentationSynchronizer::default().synchronize(&reference, &mut target);

    assert_eq!(target.style_override(StyleProperty::Width).as_deref(), Some("200px"));
    assert_eq!(target.style_override(StyleProperty::Transform), None);
}

#[test]
fn synchronize_is_idempotent() {
    let reference = reference_surface();
    let mut target = HeadlessSurface::default();
    let synchronizer = PresentationSynchronizer::default();

    synchronizer.synchronize(&reference, &mut target);
    let first: Vec<_> = SYNCED_PROPERTIES
        .iter()
        .map(|p| target.style_override(*p))
        .collect();
    synchronizer.synchronize(&reference, &mut target);
    let second: Vec<_> = SYNCED_PROPERTIES
        .iter()
        .map(|p| target.style_override(*p))
        .collect();

    assert_eq!(first, second);
}

#[test]
fn hidden_reference_only_resets_target() {
    let mut reference = reference_surface();
    reference.set_visible(false);
    let mut target = HeadlessSurface::default();
    target.set_style_override(StyleProperty::Height, Some("10px".into()));

    let copied = PresentationSynchronizer::default().synchronize(&reference, &mut target);

    assert_eq!(copied, 0);
    assert_eq!(target.style_override(StyleProperty::Height), None);
}

#[tokio::test]
async fn headless_load_resolves_immediately() {
    let mut surface = HeadlessSurface::default();
    let url = Url::parse("http://127.0.0.1:5000/processed/out1.png").expect("url");
    let load = surface.load(SurfaceSource::Remote(url.clone()));
    assert_eq!(load.await.expect("load signal"), Ok(()));
    assert_eq!(surface.source(), Some(SurfaceSource::Remote(url)));

    surface.set_caption(Some("caption".into()));
    surface.set_visible(true);
    surface.clear();
    assert_eq!(surface.source(), None);
    assert!(!surface.is_visible());
    assert_eq!(surface.caption(), None);
}
