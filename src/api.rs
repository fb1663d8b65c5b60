//! A core module describing the Danbooru/Gelbooru `dapi` XML API.
//!
//! Usually, you don't need this module directly: [`crate::browser::Browser`] builds the
//! [`url`]s, sends them, and parses the responses into [`data`].

use std::str::FromStr;

use roxmltree::{Document, Node};
use serde::Serialize;

use crate::error::{BooruError, Result};

/// The URLs of the `dapi` API.
pub mod url {
    use reqwest::Url;

    use crate::error::{BooruError, Result};

    /// The entry point of every `dapi` query, relative to the booru's base URL.
    pub const INDEX_PATH: &str = "/index.php";

    /// Join tags with a space, the way the API expects them in a single `tags` value.
    ///
    /// Escaping happens when the value is put into the query string.
    pub fn join_tags<S: AsRef<str>>(tags: &[S]) -> String {
        tags.iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn dapi(base_url: &str, s: &str, params: &[(&str, &str)]) -> Result<Url> {
        let endpoint = format!("{base_url}{INDEX_PATH}");
        let mut url = Url::parse(&endpoint).map_err(|err| BooruError::InvalidUrl {
            url: endpoint,
            reason: err.to_string(),
        })?;
        url.query_pairs_mut()
            .extend_pairs([("page", "dapi"), ("s", s), ("q", "index")])
            .extend_pairs(params);
        Ok(url)
    }

    /// The URL listing page `pid` of the posts matching `tags`.
    ///
    /// # Errors
    ///
    /// If `base_url` is not a valid URL.
    pub fn posts<S: AsRef<str>>(base_url: &str, pid: u64, tags: &[S]) -> Result<Url> {
        dapi(
            base_url,
            "post",
            &[
                ("pid", pid.to_string().as_str()),
                ("tags", join_tags(tags).as_str()),
            ],
        )
    }

    /// The URL of the single post `id`.
    ///
    /// # Errors
    ///
    /// If `base_url` is not a valid URL.
    pub fn post(base_url: &str, id: u64) -> Result<Url> {
        dapi(base_url, "post", &[("id", id.to_string().as_str())])
    }

    /// The URL searching the tag `name`.
    ///
    /// # Errors
    ///
    /// If `base_url` is not a valid URL.
    pub fn tag(base_url: &str, name: &str) -> Result<Url> {
        dapi(base_url, "tag", &[("name", name)])
    }
}

/// The data structure of the XML responses of the `dapi` API.
pub mod data {
    use super::*;

    /// The elements of the XML envelopes.
    pub mod field {
        use ::image::DynamicImage;

        use super::*;

        /// A `<post/>` element.
        ///
        /// The image fields are empty until [`Post::load_image`] fills them.
        #[non_exhaustive]
        #[derive(Debug, Clone, Default, Serialize)]
        pub struct Post {
            /// The ID of the post.
            pub id: u64,
            /// The URL of the booru-hosted file.
            pub file_url: String,
            /// The URL of the booru-hosted downsized sample.
            pub sample_url: String,
            /// Where the artist originally published the image. May not be an image URL at all.
            pub source: String,
            /// The space separated tags of the post.
            pub tags: String,
            /// The MD5 of the booru-hosted file, if the booru reports one.
            pub md5: String,
            /// The raw bytes of the loaded image.
            #[serde(skip)]
            pub bytes: Option<Vec<u8>>,
            /// The decoded image.
            #[serde(skip)]
            pub image: Option<DynamicImage>,
            /// The perceptual hash of the decoded image, see [`crate::hash::perceptual_hash`].
            #[serde(skip_serializing_if = "Option::is_none")]
            pub phash: Option<u64>,
        }

        impl Post {
            pub(crate) fn from_node(node: Node) -> Result<Self> {
                Ok(Self {
                    id: attr_num(node, "id")?,
                    file_url: attr_str(node, "file_url"),
                    sample_url: attr_str(node, "sample_url"),
                    source: attr_str(node, "source"),
                    tags: attr_str(node, "tags"),
                    md5: attr_str(node, "md5"),
                    ..Default::default()
                })
            }

            /// The tags of the post as a list. Note: the booru pads `tags` with spaces.
            pub fn tag_list(&self) -> impl Iterator<Item = &str> {
                self.tags.split_whitespace()
            }
        }

        /// A `<tag/>` element.
        #[non_exhaustive]
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
        pub struct Tag {
            /// The ID of the tag.
            pub id: u64,
            /// The category of the tag, e.g. `0` for general, `4` for character.
            #[serde(rename = "type")]
            pub kind: i32,
            /// The number of posts carrying the tag.
            pub count: i64,
            /// The name of the tag.
            pub name: String,
        }

        impl Tag {
            pub(crate) fn from_node(node: Node) -> Result<Self> {
                Ok(Self {
                    id: attr_num(node, "id")?,
                    kind: attr_num(node, "type")?,
                    count: attr_num(node, "count")?,
                    name: attr_str(node, "name"),
                })
            }
        }
    }

    /// The `<posts>` envelope: one page of a post listing.
    #[non_exhaustive]
    #[derive(Debug, Clone, Default, Serialize)]
    pub struct Page {
        /// The total number of posts matching the query, over all pages.
        pub count: u64,
        /// The offset the booru reports for this page.
        ///
        /// When page `1` is queried without tags, this is the post cap of the booru.
        pub offset: u64,
        /// The posts of this page.
        pub posts: Vec<field::Post>,
    }

    impl Page {
        /// Parse a `<posts>` document.
        ///
        /// # Errors
        ///
        /// If `body` is not XML, or its root is not `<posts>`, or a numeric attribute is malformed.
        pub fn from_xml(body: &[u8]) -> Result<Self> {
            let text = utf8(body)?;
            let doc = Document::parse(text)?;
            let root = expect_root(&doc, "posts")?;

            let posts = root
                .children()
                .filter(|node| node.has_tag_name("post"))
                .map(field::Post::from_node)
                .collect::<Result<Vec<_>>>()?;

            Ok(Self {
                count: attr_num(root, "count")?,
                offset: attr_num(root, "offset")?,
                posts,
            })
        }
    }

    /// The `<tags>` envelope of a tag search.
    #[non_exhaustive]
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
    pub struct TagSet {
        /// The `type` attribute of the envelope.
        #[serde(rename = "type")]
        pub kind: String,
        /// The matching tags.
        pub tags: Vec<field::Tag>,
    }

    /// What a tag search may answer with.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum TagResponse {
        /// The documented `<tags>` envelope.
        Set(TagSet),
        /// A bare `<tag>` root, which some boorus send instead of an envelope.
        ///
        /// Its attributes are not read, it only ever means "no match".
        Bare,
    }

    impl TagResponse {
        /// Parse a `<tags>` or bare `<tag>` document.
        ///
        /// # Errors
        ///
        /// If `body` is not XML, or its root is neither `<tags>` nor `<tag>`,
        /// or a numeric attribute inside `<tags>` is malformed.
        pub fn from_xml(body: &[u8]) -> Result<Self> {
            let text = utf8(body)?;
            let doc = Document::parse(text)?;
            let root = doc.root_element();

            if root.has_tag_name("tag") {
                return Ok(Self::Bare);
            }
            let root = expect_root(&doc, "tags")?;
            let tags = root
                .children()
                .filter(|node| node.has_tag_name("tag"))
                .map(field::Tag::from_node)
                .collect::<Result<Vec<_>>>()?;

            Ok(Self::Set(TagSet {
                kind: attr_str(root, "type"),
                tags,
            }))
        }
    }
}

fn utf8(body: &[u8]) -> Result<&str> {
    std::str::from_utf8(body).map_err(|err| BooruError::Parse(err.to_string()))
}

fn expect_root<'a, 'input>(
    doc: &'a Document<'input>,
    name: &str,
) -> Result<Node<'a, 'input>> {
    let root = doc.root_element();
    if root.has_tag_name(name) {
        Ok(root)
    } else {
        Err(BooruError::Parse(format!(
            "expected element type <{name}> but have <{}>",
            root.tag_name().name()
        )))
    }
}

/// A missing string attribute reads as empty.
fn attr_str(node: Node, name: &str) -> String {
    node.attribute(name).unwrap_or_default().to_owned()
}

/// A missing numeric attribute reads as zero; a malformed one is an error.
fn attr_num<T>(node: Node, name: &str) -> Result<T>
where
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    match node.attribute(name).map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(value) => value.parse().map_err(|err| {
            BooruError::Parse(format!(
                "attribute {name}={value:?} of <{}>: {err}",
                node.tag_name().name()
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::data::field::Tag;
    use super::data::{Page, TagResponse};
    use super::*;

    const BASE_URL: &str = "https://gelbooru.com";

    const PAGE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<posts count="1234" offset="100">
    <post height="1200" score="5" file_url="https://img.gelbooru.com/images/aa/bb/aabb.jpg" sample_url="https://img.gelbooru.com/samples/aa/bb/sample_aabb.jpg" rating="g" tags=" cat solo " id="42" width="900" md5="aabb" source="https://example.com/art/1.png"/>
    <post file_url="//img.gelbooru.com/images/cc/dd/ccdd.png" id="43" tags="cat"/>
</posts>"#;

    #[test]
    fn test_posts_url() {
        let url = url::posts(BASE_URL, 1, &[] as &[&str]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://gelbooru.com/index.php?page=dapi&s=post&q=index&pid=1&tags="
        );

        let url = url::posts(BASE_URL, 3, &["cat", "rating:safe"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://gelbooru.com/index.php?page=dapi&s=post&q=index&pid=3&tags=cat+rating%3Asafe"
        );
    }

    #[test]
    fn test_post_and_tag_url() {
        let url = url::post(BASE_URL, 42).unwrap();
        assert_eq!(
            url.as_str(),
            "https://gelbooru.com/index.php?page=dapi&s=post&q=index&id=42"
        );

        let url = url::tag(BASE_URL, "cat ears&more").unwrap();
        assert_eq!(
            url.as_str(),
            "https://gelbooru.com/index.php?page=dapi&s=tag&q=index&name=cat+ears%26more"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = url::post("not a url", 1).unwrap_err();
        assert!(matches!(err, BooruError::InvalidUrl { .. }));
    }

    #[test]
    fn test_parse_page() {
        let page = Page::from_xml(PAGE_XML.as_bytes()).unwrap();
        assert_eq!(page.count, 1234);
        assert_eq!(page.offset, 100);
        assert_eq!(page.posts.len(), 2);

        let post = &page.posts[0];
        assert_eq!(post.id, 42);
        assert_eq!(post.md5, "aabb");
        assert_eq!(post.source, "https://example.com/art/1.png");
        assert_eq!(post.tag_list().collect::<Vec<_>>(), ["cat", "solo"]);
        assert!(post.image.is_none());

        // missing attributes default to empty
        let post = &page.posts[1];
        assert_eq!(post.id, 43);
        assert!(post.source.is_empty());
        assert!(post.sample_url.is_empty());
    }

    #[test]
    fn test_parse_empty_page() {
        let page = Page::from_xml(br#"<posts count="0" offset="0"></posts>"#).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.posts.is_empty());
    }

    #[test]
    fn test_parse_page_errors() {
        let err = Page::from_xml(b"<html>busy</html>").unwrap_err();
        assert!(err
            .to_string()
            .contains("expected element type <posts> but have <html>"));

        let err = Page::from_xml(b"<posts count=\"many\"/>").unwrap_err();
        assert!(matches!(err, BooruError::Parse(_)));

        let err = Page::from_xml(b"not xml at all").unwrap_err();
        assert!(matches!(err, BooruError::Parse(_)));

        let err = Page::from_xml(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, BooruError::Parse(_)));
    }

    #[test]
    fn test_parse_tags() {
        let xml = r#"<tags type="array">
            <tag type="0" count="98765" name="cat" ambiguous="false" id="7"/>
            <tag type="4" count="12" name="cat_girl" ambiguous="false" id="8"/>
        </tags>"#;
        let TagResponse::Set(set) = TagResponse::from_xml(xml.as_bytes()).unwrap() else {
            panic!("expected a <tags> envelope");
        };
        assert_eq!(set.kind, "array");
        assert_eq!(set.tags.len(), 2);
        assert_eq!(
            set.tags[1],
            Tag {
                id: 8,
                kind: 4,
                count: 12,
                name: String::from("cat_girl"),
            }
        );
    }

    #[test]
    fn test_parse_bare_tag() {
        let xml = r#"<tag type="0" count="1" name="cat" id="7"/>"#;
        let resp = TagResponse::from_xml(xml.as_bytes()).unwrap();
        assert_eq!(resp, TagResponse::Bare);

        let xml = r#"<tag type="" count="n/a" name="cat" id="seven"/>"#;
        let resp = TagResponse::from_xml(xml.as_bytes()).unwrap();
        assert_eq!(resp, TagResponse::Bare);

        let err = TagResponse::from_xml(b"<posts/>").unwrap_err();
        assert!(matches!(err, BooruError::Parse(_)));
    }
}
