//! Template PDF manipulation over lopdf
//!
//! `TemplateDocument` wraps a loaded template and exposes the primitives
//! the layout engine needs: page size, page snapshot and insertion, font and
//! image embedding, and committing a page's drawing operations.
//!
//! Drawing never edits the template's own content streams. Committing a page
//! wraps the existing contents in `q`/`Q` and appends one new stream, and
//! copies the page's (possibly inherited) resources inline before adding
//! our font and image names.

pub mod canvas;
pub mod font;
pub mod image;

pub use canvas::PageCanvas;
pub use font::{Font, StandardFont};
pub use image::ImageHandle;

use crate::error::LayoutError;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeSet;

/// Resource name of the render font on every page
pub const FONT_RESOURCE: &str = "FInv";

/// US Letter, used when no MediaBox is found
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Guard against cyclic Parent chains in malformed page trees
const MAX_TREE_DEPTH: usize = 32;

/// A page dictionary captured before anything was drawn on it
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    dict: Dictionary,
}

pub struct TemplateDocument {
    doc: Document,
    font_id: Option<ObjectId>,
    used_chars: BTreeSet<char>,
    /// Shared `q` / `Q` streams that isolate template contents
    state_streams: Option<(ObjectId, ObjectId)>,
    image_count: usize,
}

impl TemplateDocument {
    pub fn load(bytes: &[u8]) -> Result<Self, LayoutError> {
        let doc = Document::load_mem(bytes).map_err(|e| LayoutError::Parse(e.to_string()))?;
        if doc.get_pages().is_empty() {
            return Err(LayoutError::Parse("template has no pages".into()));
        }
        Ok(Self {
            doc,
            font_id: None,
            used_chars: BTreeSet::new(),
            state_streams: None,
            image_count: 0,
        })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    fn page_id(&self, index: usize) -> Result<ObjectId, LayoutError> {
        // lopdf numbers pages from 1
        self.doc
            .get_pages()
            .get(&(index as u32 + 1))
            .copied()
            .ok_or_else(|| {
                LayoutError::Operation(format!(
                    "page {} does not exist (document has {} pages)",
                    index + 1,
                    self.page_count()
                ))
            })
    }

    /// Width and height of a page in points
    pub fn page_size(&self, index: usize) -> Result<(f32, f32), LayoutError> {
        let page_id = self.page_id(index)?;
        Ok(self.media_box(page_id).map_or(DEFAULT_PAGE_SIZE, |[x0, y0, x1, y1]| {
            ((x1 - x0).abs(), (y1 - y0).abs())
        }))
    }

    fn media_box(&self, page_id: ObjectId) -> Option<[f32; 4]> {
        let mut current = page_id;
        for _ in 0..MAX_TREE_DEPTH {
            let dict = self.doc.get_dictionary(current).ok()?;
            if let Ok(media_box) = dict.get(b"MediaBox") {
                let media_box = match media_box {
                    Object::Reference(id) => self.doc.get_object(*id).ok()?,
                    other => other,
                };
                if let Object::Array(values) = media_box {
                    let values: Vec<f32> = values.iter().filter_map(number).collect();
                    if values.len() == 4 {
                        return Some([values[0], values[1], values[2], values[3]]);
                    }
                }
                return None;
            }
            current = match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) => *parent,
                _ => return None,
            };
        }
        None
    }

    /// Reserve the font object; its dictionary is written by `save`
    pub fn embed_font(&mut self) -> ObjectId {
        *self.font_id.get_or_insert_with(|| self.doc.new_object_id())
    }

    pub fn embed_png(&mut self, bytes: &[u8]) -> Result<ImageHandle, String> {
        let name = format!("ImInv{}", self.image_count);
        let handle = image::embed_png(&mut self.doc, bytes, name)?;
        self.image_count += 1;
        Ok(handle)
    }

    pub fn snapshot_page(&self, index: usize) -> Result<PageSnapshot, LayoutError> {
        let page_id = self.page_id(index)?;
        let dict = self.doc.get_dictionary(page_id)?.clone();
        Ok(PageSnapshot { dict })
    }

    /// Insert a copy of `snapshot` as page `index`, directly after page `index - 1`
    pub fn insert_page(
        &mut self,
        index: usize,
        snapshot: &PageSnapshot,
    ) -> Result<ObjectId, LayoutError> {
        if index == 0 {
            return Err(LayoutError::Operation(
                "cannot insert before the first template page".into(),
            ));
        }
        let previous_id = self.page_id(index - 1)?;
        let parent_id = match self.doc.get_dictionary(previous_id)?.get(b"Parent") {
            Ok(Object::Reference(id)) => *id,
            _ => {
                return Err(LayoutError::Operation(
                    "page has no parent in the page tree".into(),
                ))
            }
        };

        let mut dict = snapshot.dict.clone();
        dict.set("Parent", Object::Reference(parent_id));
        let new_id = self.doc.add_object(Object::Dictionary(dict));

        let parent = self.doc.get_dictionary_mut(parent_id)?;
        let kids = parent.get_mut(b"Kids")?.as_array_mut()?;
        let position = kids
            .iter()
            .position(|kid| matches!(kid, Object::Reference(id) if *id == previous_id))
            .map_or(kids.len(), |pos| pos + 1);
        kids.insert(position, Object::Reference(new_id));

        // Bump Count on the parent and every ancestor
        let mut current = Some(parent_id);
        for _ in 0..MAX_TREE_DEPTH {
            let Some(node_id) = current else { break };
            let node = self.doc.get_dictionary_mut(node_id)?;
            let count = node.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
            node.set("Count", Object::Integer(count + 1));
            current = match node.get(b"Parent") {
                Ok(Object::Reference(id)) => Some(*id),
                _ => None,
            };
        }

        Ok(new_id)
    }

    pub fn begin_page(&self, index: usize) -> Result<PageCanvas, LayoutError> {
        let page_id = self.page_id(index)?;
        let (width, height) = self.page_size(index)?;
        Ok(PageCanvas::new(index, page_id, width, height))
    }

    /// Write the canvas's operations and resources into its page
    pub fn commit_page(&mut self, canvas: PageCanvas) -> Result<(), LayoutError> {
        if canvas.is_empty() {
            return Ok(());
        }

        let mut resources = self.inherited_resources(canvas.page_id);
        if canvas.uses_font {
            let font_id = self.font_id.ok_or_else(|| {
                LayoutError::Operation("text drawn before a font was embedded".into())
            })?;
            merge_resource(&mut resources, "Font", FONT_RESOURCE, font_id);
        }
        for (name, id) in &canvas.xobjects {
            merge_resource(&mut resources, "XObject", name, *id);
        }

        let mut operations = Vec::with_capacity(canvas.operations.len() + 2);
        operations.push(Operation::new("q", vec![]));
        operations.extend(canvas.operations);
        operations.push(Operation::new("Q", vec![]));
        let content = Content { operations }.encode()?;
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content));

        let (save_id, restore_id) = self.state_streams();
        let page = self.doc.get_dictionary_mut(canvas.page_id)?;
        let mut contents = vec![Object::Reference(save_id)];
        match page.get(b"Contents") {
            Ok(Object::Array(existing)) => contents.extend(existing.iter().cloned()),
            Ok(Object::Reference(id)) => contents.push(Object::Reference(*id)),
            _ => {}
        }
        contents.push(Object::Reference(restore_id));
        contents.push(Object::Reference(content_id));
        page.set("Contents", Object::Array(contents));
        page.set("Resources", Object::Dictionary(resources));

        self.used_chars.extend(canvas.used_chars);
        Ok(())
    }

    fn state_streams(&mut self) -> (ObjectId, ObjectId) {
        if let Some(ids) = self.state_streams {
            return ids;
        }
        let save_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let restore_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
        self.state_streams = Some((save_id, restore_id));
        (save_id, restore_id)
    }

    /// The page's effective resources, copied with Font/XObject dictionaries resolved
    fn inherited_resources(&self, page_id: ObjectId) -> Dictionary {
        let mut current = page_id;
        let mut found = None;
        for _ in 0..MAX_TREE_DEPTH {
            let Ok(dict) = self.doc.get_dictionary(current) else {
                break;
            };
            if let Ok(resources) = dict.get(b"Resources") {
                found = match resources {
                    Object::Dictionary(d) => Some(d.clone()),
                    Object::Reference(id) => self.doc.get_dictionary(*id).ok().cloned(),
                    _ => None,
                };
                break;
            }
            current = match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) => *parent,
                _ => break,
            };
        }

        let mut resources = found.unwrap_or_default();
        for category in [b"Font".as_slice(), b"XObject".as_slice()] {
            if let Ok(Object::Reference(id)) = resources.get(category) {
                let resolved = self.doc.get_dictionary(*id).ok().cloned().unwrap_or_default();
                resources.set(category.to_vec(), Object::Dictionary(resolved));
            }
        }
        resources
    }

    /// Write the font dictionary and serialize the document
    pub fn save(mut self, font: &Font) -> Result<Vec<u8>, LayoutError> {
        if let Some(font_id) = self.font_id {
            let dict = font.build_dictionary(&mut self.doc, &self.used_chars)?;
            self.doc.objects.insert(font_id, Object::Dictionary(dict));
        }

        self.doc.compress();

        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| LayoutError::Operation(e.to_string()))?;
        Ok(output)
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn merge_resource(resources: &mut Dictionary, category: &str, name: &str, id: ObjectId) {
    let mut entries = match resources.get(category.as_bytes()) {
        Ok(Object::Dictionary(existing)) => existing.clone(),
        _ => Dictionary::new(),
    };
    entries.set(name, Object::Reference(id));
    resources.set(category, Object::Dictionary(entries));
}
