//! HTML presentation of a [`DerivedView`].
//!
//! Every panel is a pure function of its inputs and the page is rebuilt
//! from scratch on each selection change.

use crate::config::MapConfig;
use crate::error::RenderError;
use crate::types::{DerivedView, RankEntry, Selection, SingleValue, TrendPoint, RANKING_SIZE, YEARS};
use plotters::prelude::*;
use serde_json::json;

pub const PAGE_TITLE: &str = "USA Population Trends";
pub const NO_DATA_NOTICE: &str = "No data available for the selected filters.";

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";

const CHART_SIZE: (u32, u32) = (700, 360);
const LINE_COLOR: RGBColor = RGBColor(0x63, 0x6e, 0xfa);

/// Where the map panel gets its boundary `GeoJSON` from.
#[derive(Debug, Clone, Copy)]
pub enum MapSource<'a> {
    /// Fetched by the browser (served dashboard).
    Url(&'a str),
    /// Serialized `FeatureCollection` embedded in the page (static render).
    Inline(&'a str),
}

pub struct DashboardPage<'a> {
    pub states: &'a [&'a str],
    /// `None` when the table has no rows to select from.
    pub view: Option<&'a DerivedView>,
    pub map: &'a MapConfig,
    pub boundaries: MapSource<'a>,
    /// Target of the selector form; `None` renders the selectors disabled.
    pub form_action: Option<&'a str>,
}

pub fn render_dashboard(page: &DashboardPage) -> Result<String, RenderError> {
    let (statement, chart, ranking) = match page.view {
        Some(view) => (
            render_statement(&view.selection, view.single_value),
            render_trend_chart(&view.trend_series)?,
            render_ranking_table(&view.ranking),
        ),
        None => (render_notice(), render_trend_chart(&[])?, render_ranking_table(&[])),
    };

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<link rel="stylesheet" href="{leaflet_css}">
<script src="{leaflet_js}"></script>
<style>{style}</style>
</head>
<body>
<aside class="sidebar">
{selectors}
</aside>
<main>
<h1>USA Population Trends Dashboard</h1>
<div class="columns">
<section class="left">
{map}
{statement}
{chart}
</section>
<section class="right">
<h3>Top {top} States by Population</h3>
{ranking}
</section>
</div>
</main>
</body>
</html>
"#,
        title = PAGE_TITLE,
        leaflet_css = LEAFLET_CSS,
        leaflet_js = LEAFLET_JS,
        style = PAGE_STYLE,
        selectors = render_selectors(page.states, page.view.map(|v| &v.selection), page.form_action),
        map = render_map(page.map, page.boundaries),
        top = RANKING_SIZE,
    ))
}

pub fn render_selectors(
    states: &[&str],
    selection: Option<&Selection>,
    form_action: Option<&str>,
) -> String {
    let disabled = if form_action.is_some() { "" } else { " disabled" };
    let selected_year = selection.map_or(*YEARS.start(), |s| s.year);
    let selected_state = selection.map(|s| s.state.as_str());

    let year_options: String = YEARS
        .map(|year| {
            let selected = if year == selected_year { " selected" } else { "" };
            format!(r#"<option value="{year}"{selected}>{year}</option>"#)
        })
        .collect();

    let state_options: String = states
        .iter()
        .map(|state| {
            let selected = if Some(*state) == selected_state { " selected" } else { "" };
            let name = escape_html(state);
            format!(r#"<option value="{name}"{selected}>{name}</option>"#)
        })
        .collect();

    let submit = if form_action.is_some() {
        r#"<noscript><button type="submit">Apply</button></noscript>"#
    } else {
        ""
    };

    format!(
        r#"<form method="get" action="{action}"><label for="year">Select Year</label><select id="year" name="year" onchange="this.form.submit()"{disabled}>{year_options}</select><label for="state">Select State</label><select id="state" name="state" onchange="this.form.submit()"{disabled}>{state_options}</select>{submit}</form>"#,
        action = escape_html(form_action.unwrap_or("")),
    )
}

/// Pan/zoom map with flat-styled boundaries and a name tooltip.
/// Population is not encoded in the polygons.
pub fn render_map(config: &MapConfig, source: MapSource) -> String {
    let options = json!({
        "center": config.center,
        "zoom": config.zoom,
        "tileUrl": config.tile_url,
        "attribution": config.attribution,
        "tooltipLabel": config.tooltip_label,
        "style": {
            "fillColor": config.fill_color,
            "color": config.stroke_color,
            "weight": config.stroke_weight,
            "fillOpacity": config.fill_opacity,
        },
    });

    let load = match source {
        MapSource::Url(url) => format!(
            "fetch({}).then(function (r) {{ return r.json(); }}).then(addBoundaries);",
            script_safe(&json!(url).to_string())
        ),
        MapSource::Inline(geojson) => format!("addBoundaries({});", script_safe(geojson)),
    };

    format!(
        r#"<div id="map"></div>
<script>
(function () {{
  var opts = {options};
  var map = L.map('map').setView(opts.center, opts.zoom);
  L.tileLayer(opts.tileUrl, {{ attribution: opts.attribution, subdomains: 'abcd', maxZoom: 19 }}).addTo(map);
  function addBoundaries(data) {{
    L.geoJSON(data, {{
      style: function () {{ return opts.style; }},
      onEachFeature: function (feature, layer) {{
        var tip = document.createElement('span');
        tip.textContent = opts.tooltipLabel + ' ' + feature.properties.name;
        layer.bindTooltip(tip, {{ sticky: true }});
      }}
    }}).addTo(map);
  }}
  {load}
}})();
</script>"#,
        options = script_safe(&options.to_string()),
    )
}

pub fn render_statement(selection: &Selection, value: SingleValue) -> String {
    match value {
        SingleValue::Available(population) => format!(
            r#"<p class="statement">Population: <b>{}</b> in the year {}</p>"#,
            format_population(population),
            selection.year
        ),
        SingleValue::Empty => render_notice(),
    }
}

pub fn render_notice() -> String {
    format!(r#"<div class="warning">{NO_DATA_NOTICE}</div>"#)
}

/// Year (x) vs. population (y) line chart with point markers, as inline SVG.
pub fn render_trend_chart(series: &[TrendPoint]) -> Result<String, RenderError> {
    let mut svg = String::new();
    draw_trend_chart(&mut svg, series).map_err(|e| RenderError::Chart(e.to_string()))?;
    Ok(format!(r#"<div class="chart">{svg}</div>"#))
}

fn draw_trend_chart(
    out: &mut String,
    series: &[TrendPoint],
) -> Result<(), DrawingAreaErrorKind<std::io::Error>> {
    let root = SVGBackend::with_string(out, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let (lo, hi) = y_domain(series).unwrap_or((0, 1));
    let years = u32::from(*YEARS.start())..u32::from(*YEARS.end());

    let mut chart = ChartBuilder::on(&root)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(90)
        .build_cartesian_2d(years, lo..hi)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(YEARS.len())
        .x_desc("Year")
        .y_desc("Population")
        .y_label_formatter(&|v| format_population(*v))
        .draw()?;

    if series.is_empty() {
        let (w, h) = CHART_SIZE;
        root.draw(&Text::new(
            "No data",
            (w as i32 / 2, h as i32 / 2),
            ("sans-serif", 14).into_font(),
        ))?;
    } else {
        let points = || series.iter().map(|p| (u32::from(p.year), p.population));
        chart.draw_series(LineSeries::new(points(), LINE_COLOR.stroke_width(2)))?;
        chart.draw_series(points().map(|xy| Circle::new(xy, 4, LINE_COLOR.filled())))?;
    }

    root.present()?;
    Ok(())
}

/// Padded (min, max) population range; `None` for an empty series.
fn y_domain(series: &[TrendPoint]) -> Option<(u64, u64)> {
    let min = series.iter().map(|p| p.population).min()?;
    let max = series.iter().map(|p| p.population).max()?;
    let pad = if max > min { (max - min) / 20 } else { (max / 20).max(1) };
    Some((min.saturating_sub(pad), max + pad.max(1)))
}

pub fn render_ranking_table(ranking: &[RankEntry]) -> String {
    let rows: String = ranking
        .iter()
        .map(|entry| {
            format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                escape_html(&entry.state_name),
                format_population(entry.population)
            )
        })
        .collect();

    format!(
        r#"<table class="ranking"><thead><tr><th>State</th><th>Population</th></tr></thead><tbody>{rows}</tbody></table>"#
    )
}

/// `39512223` -> `39,512,223`
pub fn format_population(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// JSON embedded in a <script> block must not close it early.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

const PAGE_STYLE: &str = "
body { margin: 0; font-family: sans-serif; display: flex; }
.sidebar { width: 220px; padding: 1rem; background: #f0f2f6; min-height: 100vh; }
.sidebar label { display: block; margin-top: 1rem; font-size: 0.9rem; }
.sidebar select { width: 100%; margin-top: 0.25rem; }
main { flex: 1; padding: 1rem 2rem; }
.columns { display: flex; gap: 2rem; }
.left { flex: 2; }
.right { flex: 1; }
#map { width: 700px; max-width: 100%; height: 400px; }
.warning { background: #fffce7; border: 1px solid #f0d000; padding: 0.75rem; }
.chart svg { width: 100%; max-width: 700px; height: auto; }
.ranking { border-collapse: collapse; width: 100%; }
.ranking th, .ranking td { border-bottom: 1px solid #ddd; padding: 0.4rem; text-align: left; }
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::sample_table;
    use crate::filter::{derive_view, resolve_selection};

    fn selection(year: u16, state: &str) -> Selection {
        Selection {
            year,
            state: state.to_string(),
        }
    }

    fn circle_ys(svg: &str) -> Vec<f64> {
        svg.split("<circle")
            .skip(1)
            .filter_map(|c| c.split("cy=\"").nth(1))
            .filter_map(|s| s.split('"').next())
            .filter_map(|s| s.parse().ok())
            .collect()
    }

    #[test]
    fn formats_population_with_separators() {
        assert_eq!(format_population(0), "0");
        assert_eq!(format_population(999), "999");
        assert_eq!(format_population(1_000), "1,000");
        assert_eq!(format_population(39_512_223), "39,512,223");
        assert_eq!(format_population(100_000_000), "100,000,000");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html(r#"<b>"A&B"</b>"#), "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;");
    }

    #[test]
    fn statement_shows_value_or_notice() {
        let html = render_statement(&selection(2015, "Ohio"), SingleValue::Available(11_600_000));
        assert_eq!(
            html,
            r#"<p class="statement">Population: <b>11,600,000</b> in the year 2015</p>"#
        );

        let html = render_statement(&selection(2015, "Ohio"), SingleValue::Empty);
        assert!(html.contains(NO_DATA_NOTICE));
        assert!(!html.contains("Population:"));
    }

    #[test]
    fn ranking_table_renames_header_and_escapes_names() {
        let html = render_ranking_table(&[
            RankEntry { state_name: "Big <State>".to_string(), population: 2_000 },
            RankEntry { state_name: "Small".to_string(), population: 10 },
        ]);
        assert!(html.contains("<th>State</th><th>Population</th>"));
        assert!(html.contains("<tr><td>Big &lt;State&gt;</td><td>2,000</td></tr>"));
        assert_eq!(html.matches("<tr>").count(), 3);
    }

    #[test]
    fn chart_draws_one_marker_per_point() {
        let series: Vec<TrendPoint> = YEARS
            .map(|year| TrendPoint { year, population: u64::from(year) * 1_000 })
            .collect();
        let html = render_trend_chart(&series).unwrap();
        assert!(html.contains("<svg"));
        assert_eq!(circle_ys(&html).len(), 10);
        assert!(html.contains("Population"));
    }

    #[test]
    fn chart_handles_flat_and_empty_series() {
        let flat = [
            TrendPoint { year: 2010, population: 500 },
            TrendPoint { year: 2011, population: 500 },
        ];
        let html = render_trend_chart(&flat).unwrap();
        assert_eq!(circle_ys(&html).len(), 2);
        assert!(!html.contains("NaN"));

        let html = render_trend_chart(&[]).unwrap();
        assert!(html.contains("No data"));
        assert!(circle_ys(&html).is_empty());
    }

    #[test]
    fn chart_puts_larger_population_higher() {
        let series = [
            TrendPoint { year: 2010, population: 100 },
            TrendPoint { year: 2019, population: 200 },
        ];
        let cy = circle_ys(&render_trend_chart(&series).unwrap());
        assert_eq!(cy.len(), 2);
        assert!(cy[1] < cy[0]);
    }

    #[test]
    fn y_domain_pads_flat_series() {
        let flat = [TrendPoint { year: 2010, population: 0 }];
        assert_eq!(y_domain(&flat), Some((0, 1)));
        assert_eq!(y_domain(&[]), None);
    }

    #[test]
    fn selectors_mark_current_selection() {
        let html = render_selectors(&["Ohio", "Utah"], Some(&selection(2013, "Utah")), Some("/"));
        assert!(html.contains(r#"<option value="2013" selected>2013</option>"#));
        assert!(html.contains(r#"<option value="Utah" selected>Utah</option>"#));
        assert!(html.contains(r#"<option value="Ohio">Ohio</option>"#));
        assert_eq!(html.matches("<option").count(), 12);
        assert!(!html.contains("disabled"));

        let html = render_selectors(&["Ohio"], Some(&selection(2010, "Ohio")), None);
        assert!(html.contains(" disabled"));
    }

    #[test]
    fn map_uses_flat_style_and_source() {
        let config = MapConfig::default();
        let html = render_map(&config, MapSource::Url("/api/boundaries"));
        assert!(html.contains(r##""fillColor":"#3186cc""##));
        assert!(html.contains(r#"fetch("/api/boundaries")"#));

        let inline = r#"{"type":"FeatureCollection","features":[],"x":"</script>"}"#;
        let html = render_map(&config, MapSource::Inline(inline));
        assert!(html.contains("addBoundaries({"));
        assert_eq!(html.matches("</script>").count(), 1);
    }

    #[test]
    fn dashboard_contains_every_panel() {
        let table = sample_table();
        let selection = resolve_selection(&table, Some(2015), Some("California")).unwrap();
        let view = derive_view(&table, &selection).unwrap();
        let states = table.state_names();
        let config = MapConfig::default();

        let html = render_dashboard(&DashboardPage {
            states: &states,
            view: Some(&view),
            map: &config,
            boundaries: MapSource::Url("/api/boundaries"),
            form_action: Some("/"),
        })
        .unwrap();

        assert!(html.contains("USA Population Trends Dashboard"));
        assert!(html.contains("Top 10 States by Population"));
        assert!(html.contains("Population: <b>38,250,000</b> in the year 2015"));
        assert!(html.contains(r#"<div id="map"></div>"#));
        assert_eq!(circle_ys(&html).len(), 10);
        assert_eq!(html.matches("<td>").count(), 2 * RANKING_SIZE);
    }

    #[test]
    fn dashboard_without_rows_shows_notice() {
        let config = MapConfig::default();
        let html = render_dashboard(&DashboardPage {
            states: &[],
            view: None,
            map: &config,
            boundaries: MapSource::Url("/api/boundaries"),
            form_action: Some("/"),
        })
        .unwrap();

        assert!(html.contains(NO_DATA_NOTICE));
        assert!(html.contains(r#"<option value="2010" selected>2010</option>"#));
        assert_eq!(html.matches("<td>").count(), 0);
    }
}
