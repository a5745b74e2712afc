//! Per-page drawing surface
//!
//! A `PageCanvas` buffers drawing operations for one page. Nothing touches
//! the document until the canvas is committed back with
//! `TemplateDocument::commit_page`.

use super::font::Font;
use super::image::ImageHandle;
use super::FONT_RESOURCE;
use lopdf::content::Operation;
use lopdf::{Object, ObjectId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug)]
pub struct PageCanvas {
    pub(crate) index: usize,
    pub(crate) page_id: ObjectId,
    width: f32,
    height: f32,
    pub(crate) operations: Vec<Operation>,
    pub(crate) xobjects: BTreeMap<String, ObjectId>,
    pub(crate) uses_font: bool,
    pub(crate) used_chars: BTreeSet<char>,
}

impl PageCanvas {
    pub(crate) fn new(index: usize, page_id: ObjectId, width: f32, height: f32) -> Self {
        Self {
            index,
            page_id,
            width,
            height,
            operations: Vec::new(),
            xobjects: BTreeMap::new(),
            uses_font: false,
            used_chars: BTreeSet::new(),
        }
    }

    /// Zero-based page index
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Draw one line of text with its baseline origin at (x, y)
    pub fn draw_text(
        &mut self,
        font: &Font,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
        color: [f32; 3],
    ) {
        let [r, g, b] = color;
        let font_name = Object::Name(FONT_RESOURCE.as_bytes().to_vec());
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("rg", vec![r.into(), g.into(), b.into()]),
            Operation::new("Tf", vec![font_name, size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![font.encode(text)]),
            Operation::new("ET", vec![]),
        ]);
        self.uses_font = true;
        self.used_chars.extend(text.chars());
    }

    /// Draw an embedded image with its lower-left corner at (x, y)
    pub fn draw_image(&mut self, image: &ImageHandle, x: f32, y: f32, width: f32, height: f32) {
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![width.into(), 0.into(), 0.into(), height.into(), x.into(), y.into()],
            ),
            Operation::new("Do", vec![Object::Name(image.name.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
        self.xobjects.insert(image.name.clone(), image.id);
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
