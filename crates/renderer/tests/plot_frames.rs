use xyplot::{
    Color, DataSource, DirtyState, ItemSize, PlotEvent, PlotNode, Point2D, ViewRect, XyPlot,
};

const DECADES: [f64; 6] = [0.0, 1.0, 1.0, 10.0, 2.0, 100.0];

fn decade_source() -> DataSource {
    let mut source = DataSource::new();
    source.set_data_f64(&DECADES, DECADES.len(), 1).unwrap();
    source
}

fn decade_plot() -> XyPlot {
    let mut plot = XyPlot::new();
    plot.set_view_rect(ViewRect::from_corners((0.0, 0.0), (2.0, 100.0)));
    plot.set_size(ItemSize::new(400.0, 300.0));
    plot
}

fn line_vertices(root: &PlotNode) -> Vec<Point2D> {
    root.layers().unwrap().line.geometry.vertices().to_vec()
}

#[test]
fn line_follows_samples_and_log_y() {
    let source = decade_source();
    let mut plot = decade_plot();

    let root = plot.update_paint_node(None, Some(&source));
    assert_eq!(
        line_vertices(&root),
        vec![
            Point2D::new(0.0, 1.0),
            Point2D::new(1.0, 10.0),
            Point2D::new(2.0, 100.0)
        ]
    );

    assert!(plot.set_log_y(true));
    let root = plot.update_paint_node(Some(root), Some(&source));
    assert_eq!(
        line_vertices(&root),
        vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(1.0, 1.0),
            Point2D::new(2.0, 2.0)
        ]
    );
}

#[test]
fn fill_ignores_log_y() {
    let source = decade_source();
    let mut plot = decade_plot();
    plot.set_log_y(true);
    let root = plot.update_paint_node(None, Some(&source));
    let fill = root.layers().unwrap().fill.geometry.vertices();
    assert_eq!(fill[5], Point2D::new(2.0, 100.0));
    assert_eq!(fill[4], Point2D::new(2.0, 0.0));
}

#[test]
fn vertex_counts_track_sample_count() {
    let mut plot = XyPlot::new();
    plot.set_marker_enabled(true);
    let mut source = DataSource::new();
    let mut root = None;
    for samples in [0usize, 1, 5, 3, 64] {
        let data: Vec<f64> = (0..samples * 2).map(|i| i as f64).collect();
        source.set_data_f64(&data, data.len(), 1).unwrap();
        let node = plot.update_paint_node(root.take(), Some(&source));
        let layers = node.layers().unwrap();
        assert_eq!(layers.fill.geometry.vertex_count(), 2 * samples);
        assert_eq!(layers.line.geometry.vertex_count(), samples);
        assert_eq!(layers.marker.geometry.vertex_count(), samples);
        root = Some(node);
    }
}

#[test]
fn unchanged_data_skips_rebuild() {
    let source = decade_source();
    let mut plot = decade_plot();
    plot.set_marker_enabled(true);

    let mut root = plot.update_paint_node(None, Some(&source));
    assert!(root.take_dirty().geometry);
    let revisions = |root: &PlotNode| {
        let layers = root.layers().unwrap();
        (
            layers.fill.geometry.revision(),
            layers.line.geometry.revision(),
            layers.marker.geometry.revision(),
        )
    };
    let before = revisions(&root);

    let root = plot.update_paint_node(Some(root), Some(&source));
    assert_eq!(revisions(&root), before);
    assert!(!root.dirty().geometry);
    let layers = root.layers().unwrap();
    assert!(layers.fill.is_data_valid() && layers.line.is_data_valid());
    assert!(layers.marker.is_data_valid());
}

#[test]
fn idempotent_setters_emit_nothing() {
    let mut plot = decade_plot();
    plot.drain_events();
    plot.take_update_request();

    plot.set_view_rect(ViewRect::from_corners((0.0, 0.0), (2.0, 100.0)));
    plot.set_line_color(Color::BLACK);
    plot.set_marker_size(5.0);
    plot.set_size(ItemSize::new(400.0, 300.0));
    assert!(plot.drain_events().is_empty());
    assert!(!plot.take_update_request());

    plot.set_marker_color(Color::WHITE);
    assert_eq!(
        plot.drain_events(),
        vec![PlotEvent::MarkerColorChanged(Color::WHITE)]
    );
}

#[test]
fn losing_the_source_drops_all_layers() {
    let source = decade_source();
    let mut plot = decade_plot();
    let root = plot.update_paint_node(None, Some(&source));
    assert_eq!(root.child_count(), 3);

    let root = plot.update_paint_node(Some(root), None);
    assert_eq!(root.child_count(), 0);
    assert!(root.layers().is_none());

    let root = plot.update_paint_node(Some(root), Some(&source));
    assert_eq!(root.child_count(), 3);
    assert_eq!(line_vertices(&root).len(), 3);
}

#[test]
fn no_source_on_first_frame_yields_empty_root() {
    let mut plot = XyPlot::new();
    let root = plot.update_paint_node(None, None);
    assert_eq!(root.child_count(), 0);
    assert_eq!(root.dirty(), DirtyState::NONE);
}

#[test]
fn materials_carry_view_transform() {
    let source = decade_source();
    let mut plot = decade_plot();
    let root = plot.update_paint_node(None, Some(&source));
    let view = root.layers().unwrap().line.material.view;
    assert_eq!(view.size, [400.0, 300.0]);
    assert_eq!(view.scale, [0.5, 0.01]);
    assert_eq!(view.offset, [0.0, 0.0]);
    let (x, y) = view.map(1.0, 50.0);
    assert!((x - 200.0).abs() < 1e-9);
    assert!((y - 150.0).abs() < 1e-9);
}
