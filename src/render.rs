//! Built-in 3x5 bitmap font renderer. Text that does not fit is clipped.

use chrono::{Local, NaiveTime, Timelike};
use image::{Rgb, RgbImage};

use crate::mode::{
    ClockFace, Game, Quote, Renderer, SportsBoard, SportsView, StripRenderer, TickerSegment, Weather,
};

const GLYPH_WIDTH: u32 = 3;
const GLYPH_HEIGHT: u32 = 5;
/// Glyph plus one blank column
const ADVANCE: u32 = GLYPH_WIDTH + 1;
const LINE_HEIGHT: u32 = GLYPH_HEIGHT + 1;
/// Blank columns between ticker items
const ITEM_GAP: u32 = 8;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const GREEN: Rgb<u8> = Rgb([0, 200, 0]);
const RED: Rgb<u8> = Rgb([220, 0, 0]);
const AMBER: Rgb<u8> = Rgb([255, 160, 0]);
const CYAN: Rgb<u8> = Rgb([0, 180, 220]);

/// Rows of a glyph, top to bottom; bit 2 is the leftmost column.
fn glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        ' ' => [0, 0, 0, 0, 0],
        '0' => [7, 5, 5, 5, 7],
        '1' => [2, 6, 2, 2, 7],
        '2' => [7, 1, 7, 4, 7],
        '3' => [7, 1, 3, 1, 7],
        '4' => [5, 5, 7, 1, 1],
        '5' => [7, 4, 7, 1, 7],
        '6' => [7, 4, 7, 5, 7],
        '7' => [7, 1, 1, 2, 2],
        '8' => [7, 5, 7, 5, 7],
        '9' => [7, 5, 7, 1, 7],
        'A' => [2, 5, 7, 5, 5],
        'B' => [6, 5, 6, 5, 6],
        'C' => [3, 4, 4, 4, 3],
        'D' => [6, 5, 5, 5, 6],
        'E' => [7, 4, 6, 4, 7],
        'F' => [7, 4, 6, 4, 4],
        'G' => [3, 4, 5, 5, 3],
        'H' => [5, 5, 7, 5, 5],
        'I' => [7, 2, 2, 2, 7],
        'J' => [1, 1, 1, 5, 2],
        'K' => [5, 5, 6, 5, 5],
        'L' => [4, 4, 4, 4, 7],
        'M' => [5, 7, 7, 5, 5],
        'N' => [6, 5, 5, 5, 5],
        'O' => [2, 5, 5, 5, 2],
        'P' => [6, 5, 6, 4, 4],
        'Q' => [2, 5, 5, 6, 3],
        'R' => [6, 5, 6, 5, 5],
        'S' => [3, 4, 2, 1, 6],
        'T' => [7, 2, 2, 2, 2],
        'U' => [5, 5, 5, 5, 7],
        'V' => [5, 5, 5, 5, 2],
        'W' => [5, 5, 7, 7, 5],
        'X' => [5, 5, 2, 5, 5],
        'Y' => [5, 5, 2, 2, 2],
        'Z' => [7, 1, 2, 4, 7],
        '.' => [0, 0, 0, 0, 2],
        ',' => [0, 0, 0, 2, 4],
        ':' => [0, 2, 0, 2, 0],
        '-' => [0, 0, 7, 0, 0],
        '+' => [0, 2, 7, 2, 0],
        '/' => [1, 1, 2, 4, 4],
        '%' => [5, 1, 2, 4, 5],
        '@' => [2, 5, 7, 4, 3],
        '$' => [3, 6, 2, 3, 6],
        '\'' => [2, 2, 0, 0, 0],
        '(' => [1, 2, 2, 2, 1],
        ')' => [4, 2, 2, 2, 4],
        '°' => [2, 5, 2, 0, 0],
        _ => [7, 1, 3, 0, 2],
    }
}

/// Width in pixels of `text` at `scale`, without trailing spacing
pub fn text_width(text: &str, scale: u32) -> u32 {
    let chars = text.chars().count() as u32;
    (chars * ADVANCE).saturating_sub(1) * scale
}

/// Draw `text` with its top-left corner at (`x`, `y`), clipping at the edges
pub fn draw_text(image: &mut RgbImage, x: i64, y: i64, text: &str, color: Rgb<u8>, scale: u32) {
    let scale = i64::from(scale.max(1));
    let (width, height) = (i64::from(image.width()), i64::from(image.height()));

    for (i, c) in text.chars().enumerate() {
        let left = x + i as i64 * i64::from(ADVANCE) * scale;
        if left >= width {
            break;
        }
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = left + i64::from(col) * scale + dx;
                        let py = y + row as i64 * scale + dy;
                        if (0..width).contains(&px) && (0..height).contains(&py) {
                            image.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
    }
}

fn centered(image: &mut RgbImage, y: i64, text: &str, color: Rgb<u8>, scale: u32) {
    let x = (i64::from(image.width()) - i64::from(text_width(text, scale))) / 2;
    draw_text(image, x.max(0), y, text, color, scale);
}

/// Lines of text stacked from the top; stops when the canvas is full
fn draw_lines(image: &mut RgbImage, lines: &[(String, Rgb<u8>)]) {
    let rows = (image.height() / LINE_HEIGHT) as usize;
    for (i, (text, color)) in lines.iter().take(rows).enumerate() {
        draw_text(image, 1, i as i64 * i64::from(LINE_HEIGHT), text, *color, 1);
    }
}

fn temperature(value: f32) -> String {
    format!("{:.0}°", value)
}

fn game_line(game: &Game) -> String {
    match (game.away_score, game.home_score) {
        (Some(away), Some(home)) if game.is_live() => {
            format!("{} {} {} {}", game.away, away, game.home, home)
        }
        _ => match &game.time {
            Some(time) => format!("{}@{} {}", game.away, game.home, time),
            None => format!("{}@{}", game.away, game.home),
        },
    }
}

fn quote_line(quote: &Quote) -> (String, Rgb<u8>) {
    let color = if quote.change_percent >= 0.0 { GREEN } else { RED };
    (format!("{} {:.2} {:+.1}%", quote.symbol, quote.price, quote.change_percent), color)
}

fn theme_color(theme: &str) -> Rgb<u8> {
    match theme {
        "amber" => AMBER,
        "green" => GREEN,
        "red" => RED,
        "blue" => CYAN,
        _ => WHITE,
    }
}

fn clock_text(time: NaiveTime, hour24: bool) -> String {
    if hour24 {
        format!("{:02}:{:02}", time.hour(), time.minute())
    } else {
        let (pm, hour) = time.hour12();
        format!("{}:{:02}{}", hour, time.minute(), if pm { "PM" } else { "AM" })
    }
}

/// Text renderer used by the stock modes
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl TextRenderer {
    /// Clock face at a fixed time
    pub fn draw_clock(&self, face: &ClockFace, time: NaiveTime, width: u32, height: u32) -> RgbImage {
        let mut image = RgbImage::new(width, height);
        let color = theme_color(&face.theme);
        let text = clock_text(time, face.hour24);

        // Large digits when there is room for them and the weather strip
        let scale = if text_width(&text, 2) <= width && height >= 2 * GLYPH_HEIGHT + LINE_HEIGHT + 2 {
            2
        } else {
            1
        };
        centered(&mut image, 1, &text, color, scale);

        let strip = format!(
            "{} {}",
            temperature(face.weather.current.temperature),
            face.weather.current.description
        );
        let y = i64::from(height.saturating_sub(LINE_HEIGHT));
        centered(&mut image, y, &strip, CYAN, 1);
        image
    }
}

impl Renderer<SportsBoard> for TextRenderer {
    fn render(&self, board: &SportsBoard, width: u32, height: u32) -> RgbImage {
        let mut image = RgbImage::new(width, height);
        let (title, color) = match board.view {
            SportsView::Live => ("LIVE", GREEN),
            SportsView::Upcoming => ("NEXT", AMBER),
        };
        let mut lines = vec![(title.to_string(), color)];
        lines.extend(board.games.iter().map(|g| (game_line(g), WHITE)));
        draw_lines(&mut image, &lines);
        image
    }
}

impl Renderer<ClockFace> for TextRenderer {
    fn render(&self, face: &ClockFace, width: u32, height: u32) -> RgbImage {
        self.draw_clock(face, Local::now().time(), width, height)
    }
}

impl Renderer<Weather> for TextRenderer {
    fn render(&self, weather: &Weather, width: u32, height: u32) -> RgbImage {
        let mut image = RgbImage::new(width, height);
        let current = &weather.current;
        let mut lines = vec![(
            format!("{} {}", temperature(current.temperature), current.description),
            WHITE,
        )];
        if let Some(feels_like) = current.feels_like {
            lines.push((format!("FEELS {}", temperature(feels_like)), CYAN));
        }
        lines.extend(weather.forecasts.iter().map(|f| {
            (format!("{} {}/{}", f.label, temperature(f.high), temperature(f.low)), AMBER)
        }));
        draw_lines(&mut image, &lines);
        image
    }
}

impl Renderer<Vec<Quote>> for TextRenderer {
    fn render(&self, quotes: &Vec<Quote>, width: u32, height: u32) -> RgbImage {
        let mut image = RgbImage::new(width, height);
        let lines: Vec<(String, Rgb<u8>)> = quotes.iter().map(quote_line).collect();
        draw_lines(&mut image, &lines);
        image
    }
}

impl StripRenderer for TextRenderer {
    fn render_segment(&self, segment: &TickerSegment, height: u32) -> RgbImage {
        let items: Vec<(String, Rgb<u8>)> = match segment {
            TickerSegment::Sports(games) => games.iter().map(|g| (game_line(g), WHITE)).collect(),
            TickerSegment::Stocks(quotes) => quotes.iter().map(quote_line).collect(),
            TickerSegment::Weather(forecasts) => forecasts
                .iter()
                .map(|f| (format!("{} {}/{}", f.label, temperature(f.high), temperature(f.low)), AMBER))
                .collect(),
        };

        let width: u32 = items.iter().map(|(text, _)| text_width(text, 1) + ITEM_GAP).sum();
        let mut image = RgbImage::new(width.max(1), height);
        let y = i64::from(height.saturating_sub(GLYPH_HEIGHT) / 2);
        let mut x = 0i64;
        for (text, color) in &items {
            draw_text(&mut image, x, y, text, *color, 1);
            x += i64::from(text_width(text, 1) + ITEM_GAP);
        }
        image
    }
}
