use crate::processing::{chart_series, ChartBar};
use crate::types::Province;

const WIDTH: u32 = 680;
const HEIGHT: u32 = 360;
const MARGIN_LEFT: u32 = 70;
const MARGIN_TOP: u32 = 40;
const MARGIN_BOTTOM: u32 = 110;
const MARGIN_RIGHT: u32 = 20;

/// A rendered detail chart. Exactly one of these is alive at a time: the
/// server replaces its slot on every open, dropping the previous instance.
#[derive(Debug)]
pub struct ChartInstance {
    pub provincia: String,
    pub svg: String,
}

/// Bar chart of a province's class breakdown: class names on x (rotated),
/// area in km² on y, percentage in the hover tooltip. Returns `None` for an
/// empty class mapping (no chart is drawn for it).
pub fn render_chart(province: &Province) -> Option<ChartInstance> {
    let bars = chart_series(province);
    if bars.is_empty() {
        return None;
    }

    Some(ChartInstance {
        provincia: province.nombre.clone(),
        svg: render_svg(&province.nombre, &bars),
    })
}

fn render_svg(provincia: &str, series: &[ChartBar]) -> String {
    let chart_width = (WIDTH - MARGIN_LEFT - MARGIN_RIGHT) as f64;
    let chart_height = (HEIGHT - MARGIN_TOP - MARGIN_BOTTOM) as f64;
    let base_y = (MARGIN_TOP as f64) + chart_height;

    let max_area = series
        .iter()
        .map(|b| b.area_km2)
        .fold(0.0_f64, f64::max)
        .max(1.0);

    let slot_width = chart_width / series.len() as f64;
    let bar_width = slot_width * 0.7;

    let mut bars = String::new();
    let mut labels = String::new();
    for (i, bar) in series.iter().enumerate() {
        let x = MARGIN_LEFT as f64 + i as f64 * slot_width + (slot_width - bar_width) / 2.0;
        let bar_height = bar.area_km2 / max_area * chart_height;
        let y = base_y - bar_height;

        bars.push_str(&format!(
            r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}" opacity="0.85"><title>{}: {:.2} km² ({:.2}%)</title></rect>"##,
            x,
            y,
            bar_width,
            bar_height,
            escape(&bar.color),
            escape(&bar.nombre),
            bar.area_km2,
            bar.porcentaje,
        ));

        let label_x = MARGIN_LEFT as f64 + (i as f64 + 0.5) * slot_width;
        let label_y = base_y + 14.0;
        labels.push_str(&format!(
            r##"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="11" fill="#374151" transform="rotate(-45, {:.1}, {:.1})">{}</text>"##,
            label_x,
            label_y,
            label_x,
            label_y,
            escape(&bar.nombre),
        ));
    }

    // y-axis ticks at quarters of the maximum
    let mut ticks = String::new();
    for step in 0..=4 {
        let value = max_area * step as f64 / 4.0;
        let y = base_y - chart_height * step as f64 / 4.0;
        ticks.push_str(&format!(
            r##"<text x="{}" y="{:.1}" text-anchor="end" font-size="10" fill="#6b7280">{:.0}</text>"##,
            MARGIN_LEFT - 8,
            y + 3.0,
            value,
        ));
        ticks.push_str(&format!(
            r##"<line x1="{}" y1="{:.1}" x2="{}" y2="{:.1}" stroke="#e5e7eb" stroke-width="1"/>"##,
            MARGIN_LEFT,
            y,
            WIDTH - MARGIN_RIGHT,
            y,
        ));
    }

    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" style="background:white; border-radius:8px">
  <text x="{title_x}" y="22" text-anchor="middle" font-size="14" font-weight="600" fill="#374151">{title}</text>
  <text x="16" y="{axis_y}" text-anchor="middle" font-size="11" fill="#6b7280" transform="rotate(-90, 16, {axis_y})">Área (km²)</text>
  {ticks}
  <line x1="{left}" y1="{top}" x2="{left}" y2="{base:.1}" stroke="#9ca3af" stroke-width="1"/>
  <line x1="{left}" y1="{base:.1}" x2="{right}" y2="{base:.1}" stroke="#9ca3af" stroke-width="1"/>
  {bars}
  {labels}
</svg>"##,
        w = WIDTH,
        h = HEIGHT,
        title_x = WIDTH / 2,
        title = escape(provincia),
        axis_y = MARGIN_TOP + (HEIGHT - MARGIN_TOP - MARGIN_BOTTOM) / 2,
        ticks = ticks,
        left = MARGIN_LEFT,
        top = MARGIN_TOP,
        base = base_y,
        right = WIDTH - MARGIN_RIGHT,
        bars = bars,
        labels = labels,
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
