#[cfg(test)]
mod tests {
    use osci_core::constants::ns;
    use osci_core::message::CustomHeader;
    use osci_core::xml::{canonicalize_fragment, XmlElement, XmlError};
    use osci_core::OsciError;

    fn c14n(xml: &str) -> String {
        String::from_utf8(canonicalize_fragment(xml, &[]).unwrap()).unwrap()
    }

    #[test]
    fn attributes_are_sorted_and_empty_elements_expanded() {
        assert_eq!(
            c14n(r#"<a:x xmlns:a="urn:a" z="1" b="2"/>"#),
            r#"<a:x xmlns:a="urn:a" b="2" z="1"></a:x>"#
        );
    }

    #[test]
    fn namespace_declarations_follow_visible_use() {
        assert_eq!(
            c14n(r#"<a:x xmlns:a="urn:a" xmlns:unused="urn:u"><a:y xmlns:a="urn:a">t</a:y></a:x>"#),
            r#"<a:x xmlns:a="urn:a"><a:y>t</a:y></a:x>"#
        );
        assert_eq!(
            c14n(r#"<x xmlns="urn:d" xmlns:p="urn:p"><y p:k="v"/></x>"#),
            r#"<x xmlns="urn:d"><y xmlns:p="urn:p" p:k="v"></y></x>"#
        );
    }

    #[test]
    fn envelope_bindings_are_declared_on_the_fragment_root() {
        let out = canonicalize_fragment(r#"<osci:Note Id="n1">x</osci:Note>"#, ns::ENVELOPE_BINDINGS).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!(r#"<osci:Note xmlns:osci="{}" Id="n1">x</osci:Note>"#, ns::OSCI)
        );
    }

    #[test]
    fn comments_drop_and_text_is_escaped() {
        assert_eq!(c14n("<a>1 &lt; 2 &amp; \"q\" &gt;<!-- note --></a>"), "<a>1 &lt; 2 &amp; \"q\" &gt;</a>");
        assert_eq!(c14n("<a k='say \"hi\"'></a>"), "<a k=\"say &quot;hi&quot;\"></a>");
    }

    #[test]
    fn serialization_noise_does_not_change_the_canonical_form() {
        let a = c14n(r#"<p:r   xmlns:p="urn:p"  b='2'  a="1" ><p:c/></p:r>"#);
        let b = c14n(r#"<p:r a="1" b="2" xmlns:p="urn:p"><p:c></p:c></p:r>"#);
        assert_eq!(a, b);
    }

    #[test]
    fn unbound_prefix_is_an_error() {
        assert!(matches!(canonicalize_fragment("<q:x/>", &[]), Err(XmlError::UnboundPrefix(_))));
    }

    #[test]
    fn element_builder_escapes_and_renders_children() {
        let el = XmlElement::osci("Subject")
            .attr("Id", "s&1")
            .text("a < b")
            .child_opt(None)
            .child(XmlElement::unqualified("x"));
        assert_eq!(el.render(), r#"<osci:Subject Id="s&amp;1">a &lt; b<x></x></osci:Subject>"#);
    }

    #[test]
    fn custom_header_is_canonicalized_and_needs_an_id() {
        let header = CustomHeader::new(r#"<x:T xmlns:x="urn:t" Id="t1"   b="2" a="1"/>"#).unwrap();
        assert_eq!(header.id, "t1");
        assert_eq!(header.xml, r#"<x:T xmlns:x="urn:t" Id="t1" a="1" b="2"></x:T>"#);

        assert!(matches!(CustomHeader::new(r#"<x:T xmlns:x="urn:t"/>"#), Err(OsciError::Precondition(_))));
        assert!(CustomHeader::new("<x:T>").is_err());
    }
}
