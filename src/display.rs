use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use log::warn;
use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

/// logical resolution of the CHIP-8 screen
pub const CHIP8_COLS: usize = 64;
pub const CHIP8_ROWS: usize = 32;

/// The logical pixel grid. One byte per cell, always 0 or 1, addressed by
/// `x + y * cols`. Only ever changed by XOR-ing single cells or clearing the
/// lot; the interpreter draws into it and a `Display` presents it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    cols: usize,
    rows: usize,
    cells: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(cols: usize, rows: usize) -> Self {
        FrameBuffer {
            cols,
            rows,
            cells: vec![0; cols * rows],
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// XOR the cell at (x, y) and report whether that turned a lit pixel off.
    ///
    /// Coordinates get one wraparound correction each: subtract the bound
    /// once if at or past it, add it once if negative. Anything further out
    /// than that stays out, so e.g. x = 140 on a 64 wide screen lands on
    /// x = 76, which is the next row along. A cell that ends up past either
    /// end of the buffer is dropped and reports no erase.
    pub fn set_pixel(&mut self, x: i32, y: i32) -> bool {
        let x = wrap_once(x, self.cols as i32);
        let y = wrap_once(y, self.rows as i32);
        let index = x as i64 + y as i64 * self.cols as i64;
        match usize::try_from(index).ok().and_then(|i| self.cells.get_mut(i)) {
            Some(cell) => {
                *cell ^= 1;
                *cell == 0
            }
            None => {
                warn!("pixel ({}, {}) is off the screen, dropped", x, y);
                false
            }
        }
    }

    /// turn every pixel off
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// read-only view of the cells, row by row
    pub fn present(&self) -> &[u8] {
        &self.cells
    }

    /// whether (x, y) is lit; coordinates must already be on screen
    pub fn is_lit(&self, x: usize, y: usize) -> bool {
        self.cells[x + y * self.cols] == 1
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        FrameBuffer::new(CHIP8_COLS, CHIP8_ROWS)
    }
}

fn wrap_once(v: i32, bound: i32) -> i32 {
    if v >= bound {
        v - bound
    } else if v < 0 {
        v + bound
    } else {
        v
    }
}

/// Display is used by the emulator to put the frame buffer on a screen. It
/// should abstract the implementation details, so a variety of kinds of
/// screen would work.
pub trait Display {
    /// draw every lit cell of the frame; unlit cells are left as background
    fn draw(&mut self, frame: &FrameBuffer) -> Result<(), io::Error>;
}

/// largest number of terminal cells per pixel, in each direction
pub const MAX_SCALE: usize = 8;

// store useful metadata about the screen: cols, rows, scale
struct Resolution(usize, usize, usize);

impl Resolution {
    fn width(&self) -> usize {
        self.0 * self.2
    }

    fn height(&self) -> usize {
        self.1 * self.2
    }

    /// the bordered canvas, clipped to the terminal area we're given
    fn canvas_rect(&self, area: Rect) -> Rect {
        let side = |n: usize| u16::try_from(n.saturating_add(2)).unwrap_or(u16::MAX);
        Rect::new(0, 0, side(self.width()), side(self.height())).intersection(area)
    }

    fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.width() - 1) as f64]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [-1.0 * (self.height() - 1) as f64, 0.0]
    }

    /// expand each lit cell into a scale x scale block of canvas points,
    /// with its top-left at (col * scale, row * scale)
    fn lit_points<'a>(&self, cells: &'a [u8]) -> impl std::iter::Iterator<Item = (f64, f64)> + 'a {
        let (cols, scale) = (self.0, self.2);
        cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell == 1)
            .flat_map(move |(i, _)| {
                let (px, py) = ((i % cols) * scale, (i / cols) * scale);
                (0..scale * scale).map(move |d| {
                    (
                        (px + d % scale) as f64,        // x
                        -1.0 * (py + d / scale) as f64, // y
                    )
                })
            })
    }
}

/// monochrome display in a terminal, rendered using TUI and crossterm
pub struct MonoTermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    resolution: Resolution,
}

impl MonoTermDisplay {
    pub fn new(cols: usize, rows: usize, scale: usize) -> Result<MonoTermDisplay, io::Error> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.hide_cursor()?;
        terminal.clear()?;
        Ok(MonoTermDisplay {
            terminal,
            resolution: Resolution(cols, rows, scale.clamp(1, MAX_SCALE)),
        })
    }
}

impl Drop for MonoTermDisplay {
    fn drop(&mut self) {
        let _ = self.terminal.show_cursor();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

impl Display for MonoTermDisplay {
    fn draw(&mut self, frame: &FrameBuffer) -> Result<(), io::Error> {
        // make sure we're given a frame the size we were set up for
        assert_eq!(
            (frame.cols(), frame.rows()),
            (self.resolution.0, self.resolution.1),
            "MonoTermDisplay must have correct-sized frame to draw"
        );

        let coords = self
            .resolution
            .lit_points(frame.present())
            .collect::<Vec<_>>();
        let resolution = &self.resolution;
        let x_bounds = self.resolution.x_bounds();
        let y_bounds = self.resolution.y_bounds();

        // this assumes a 1:1 ratio between terminal cells and the canvas
        self.terminal.draw(|f| {
            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title("CHIP-8")
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds(x_bounds)
                .y_bounds(y_bounds)
                .marker(Marker::Block)
                .paint(|ctx| {
                    ctx.draw(&Points {
                        coords: &coords,
                        color: Color::White,
                    });
                });
            let size = resolution.canvas_rect(f.size());
            f.render_widget(canvas, size);
        })?;
        Ok(())
    }
}

/// useful for testing non-display routines; counts frames it was handed
#[derive(Default)]
pub struct DummyDisplay {
    pub frames: usize,
}

impl DummyDisplay {
    pub fn new() -> Self {
        DummyDisplay { frames: 0 }
    }
}

impl Display for DummyDisplay {
    fn draw(&mut self, _frame: &FrameBuffer) -> Result<(), io::Error> {
        self.frames += 1;
        Ok(())
    }
}
