//! 测试用的内存PDF构造器

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};

/// 带BOM的UTF-16BE编码
pub fn utf16(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes
}

/// 一页文本的最小PDF骨架，返回 (文档, 目录对象ID)
fn single_page(text: &str) -> (Document, ObjectId) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    (doc, pages_id)
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// 只有一行ASCII文本、没有书签和Info的PDF
pub fn plain_pdf(text: &str) -> Vec<u8> {
    let (mut doc, pages_id) = single_page(text);
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    save(doc)
}

/// 一页、带Info和两级书签的PDF
pub fn sample_pdf() -> Vec<u8> {
    let (mut doc, pages_id) = single_page("Hello");

    let outlines_id = doc.new_object_id();
    let child_id = doc.add_object(dictionary! {
        "Title" => Object::String(utf16("第一节"), StringFormat::Hexadecimal),
    });
    let chapter_id = doc.add_object(dictionary! {
        "Title" => Object::String(utf16("第一章"), StringFormat::Hexadecimal),
        "Parent" => outlines_id,
        "First" => child_id,
        "Last" => child_id,
    });
    doc.objects.insert(
        outlines_id,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => chapter_id,
            "Last" => chapter_id,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "Outlines" => outlines_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(utf16("测试文档"), StringFormat::Hexadecimal),
        "Author" => Object::string_literal("Someone"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    save(doc)
}
