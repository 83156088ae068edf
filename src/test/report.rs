#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::io::Write;
    use std::path::Path;

    use chrono::NaiveDate;
    use lopdf::content::Content;
    use lopdf::{Dictionary, Document, Object};

    use crate::catalog::SECTIONS;
    use crate::models::{Assessment, SkillTask};
    use crate::progress::{SectionProgress, latest_assessment_by_skill, section_progress};
    use crate::report::{
        FontFace, MAX_ROW_HEIGHT, MIN_ROW_HEIGHT, ReportFonts, ReportInput, SUBTITLE_TEXT_BUDGET,
        grid_layout, render_report, report_filename, report_subtitle, summary_rows_per_page,
        to_unicode_cmap, truncate_text,
    };
    use crate::skills_map::{SkillsMap, build_skills_map};
    use crate::test::test_db::task;

    const SYSTEM_SANS: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";
    const SYSTEM_SANS_BOLD: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf";

    fn generated_on() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
    }

    fn page_count(tasks: &[SkillTask]) -> usize {
        let history: Vec<Assessment> = Vec::new();
        let latest = latest_assessment_by_skill(&history);
        let map = build_skills_map(tasks, &latest);
        let sections = section_progress(tasks, &latest);
        render_pages(&map, &sections)
    }

    fn render_pages(map: &SkillsMap, sections: &[SectionProgress]) -> usize {
        let input = ReportInput {
            child_name: "Ada Lovelace",
            generated_on: generated_on(),
            filters_label: "section: ALL, mode: ALL".to_string(),
            task_count: 0,
            map,
            sections,
        };
        let bytes = render_report(&input, &ReportFonts::default()).expect("render report");
        assert!(bytes.starts_with(b"%PDF-"));

        let doc = Document::load_mem(&bytes).expect("reopen PDF");
        doc.get_pages().len()
    }

    #[test]
    fn short_grids_use_the_largest_row_height() {
        let layout = grid_layout(20);
        assert_eq!(layout.rows_per_page, 20);
        assert_eq!(layout.row_height, MAX_ROW_HEIGHT);
        assert_eq!(layout.columns_per_page, 17);
    }

    #[test]
    fn tall_grids_shrink_rows_before_splitting() {
        let layout = grid_layout(40);
        assert_eq!(layout.rows_per_page, 40);
        assert!(layout.row_height < MAX_ROW_HEIGHT);
        assert!(layout.row_height >= MIN_ROW_HEIGHT);

        let split = grid_layout(100);
        assert_eq!(split.row_height, MIN_ROW_HEIGHT);
        assert_eq!(split.rows_per_page, 61);
    }

    #[test]
    fn one_section_renders_grid_and_summary() {
        let tasks = vec![task("B1", 1, 2), task("B2", 2, 2), task("B3", 3, 2)];
        assert_eq!(page_count(&tasks), 2);
    }

    #[test]
    fn rows_split_across_pages_below_minimum_height() {
        let tasks: Vec<SkillTask> = (1..=100).map(|n| task(&format!("C{}", n), n, 1)).collect();
        assert_eq!(page_count(&tasks), 3);
    }

    #[test]
    fn columns_paginate_past_page_width() {
        let tasks: Vec<SkillTask> = SECTIONS
            .iter()
            .map(|(code, _)| task(&format!("{}1", code), 1, 1))
            .collect();
        assert_eq!(tasks.len(), 25);
        assert!(summary_rows_per_page() >= 25);
        assert_eq!(page_count(&tasks), 3);
    }

    #[test]
    fn empty_report_still_has_a_summary_page() {
        let map = build_skills_map(&Vec::<SkillTask>::new(), &HashMap::new());
        assert_eq!(render_pages(&map, &[]), 1);
    }

    #[test]
    fn text_is_truncated_with_ellipsis() {
        assert_eq!(truncate_text("Receptive Language", 40), "Receptive Language");
        assert_eq!(truncate_text("Receptive Language", 10), "Recepti...");
        assert_eq!(truncate_text("abc", 3), "abc");
        assert_eq!(truncate_text("abcdef", 3), "...");
    }

    #[test]
    fn filenames_are_sanitized() {
        let date = generated_on();
        assert_eq!(report_filename("Ada Lovelace", date), "ablls_Ada_Lovelace_2024-05-06.pdf");
        assert_eq!(report_filename("  Zoë  O'Brien! ", date), "ablls_Zo_O_Brien_2024-05-06.pdf");
        assert_eq!(report_filename("Anne-Marie", date), "ablls_Anne-Marie_2024-05-06.pdf");
        assert_eq!(report_filename("???", date), "ablls_child_2024-05-06.pdf");
    }

    #[test]
    fn fonts_resolve_to_base_families() {
        assert_eq!(
            ReportFonts::resolve("Times").unwrap().regular,
            FontFace::Base("Times-Roman")
        );
        assert_eq!(
            ReportFonts::resolve("courier-bold").unwrap().bold,
            FontFace::Base("Courier-Bold")
        );
        assert!(ReportFonts::resolve("Comic Sans").is_err());
        assert_eq!(ReportFonts::load(Some("Comic Sans")), ReportFonts::default());
        assert_eq!(ReportFonts::load(None).regular, FontFace::Base("Helvetica"));
    }

    #[test]
    fn other_fonts_render_too() {
        let tasks = vec![task("A1", 1, 1)];
        let history: Vec<Assessment> = Vec::new();
        let latest = latest_assessment_by_skill(&history);
        let map = build_skills_map(&tasks, &latest);
        let sections = section_progress(&tasks, &latest);
        let input = ReportInput {
            child_name: "Ünal",
            generated_on: generated_on(),
            filters_label: String::new(),
            task_count: 1,
            map: &map,
            sections: &sections,
        };

        let bytes = render_report(&input, &ReportFonts::resolve("courier").unwrap()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    fn single_task_input<'a>(
        child_name: &'a str,
        map: &'a SkillsMap,
        sections: &'a [SectionProgress],
    ) -> ReportInput<'a> {
        ReportInput {
            child_name,
            generated_on: generated_on(),
            filters_label: "section: ALL".to_string(),
            task_count: 1,
            map,
            sections,
        }
    }

    fn type0_fonts(doc: &Document) -> Vec<&Dictionary> {
        doc.objects
            .values()
            .filter_map(|object| object.as_dict().ok())
            .filter(|dict| {
                dict.get(b"Subtype")
                    .and_then(Object::as_name)
                    .is_ok_and(|name| name == b"Type0")
            })
            .collect()
    }

    fn shown_strings(doc: &Document, page: u32) -> Vec<Vec<u8>> {
        let page_id = doc.get_pages()[&page];
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        content
            .operations
            .into_iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn subtitle_is_cut_to_one_line() {
        let map = build_skills_map(&Vec::<SkillTask>::new(), &HashMap::new());
        let mut input = single_task_input("Ada", &map, &[]);
        assert_eq!(
            report_subtitle(&input),
            "Generated 2024-05-06 | 1 skills | section: ALL"
        );

        input.filters_label = format!("code prefix: {}", "X".repeat(400));
        let subtitle = report_subtitle(&input);
        assert_eq!(subtitle.chars().count(), SUBTITLE_TEXT_BUDGET);
        assert!(subtitle.starts_with("Generated 2024-05-06 | 1 skills | code prefix: XXX"));
        assert!(subtitle.ends_with("..."));
    }

    #[test]
    fn base_fonts_replace_cyrillic_with_question_marks() {
        let tasks = vec![task("A1", 1, 1)];
        let history: Vec<Assessment> = Vec::new();
        let latest = latest_assessment_by_skill(&history);
        let map = build_skills_map(&tasks, &latest);
        let sections = section_progress(&tasks, &latest);
        let input = single_task_input("Иван Петров", &map, &sections);

        let bytes = render_report(&input, &ReportFonts::default()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(type0_fonts(&doc).is_empty());
        assert!(
            shown_strings(&doc, 1).contains(&b"ABLLS-R skills map: ???? ??????".to_vec())
        );
    }

    #[test]
    fn embedded_font_keeps_cyrillic_names() {
        if !Path::new(SYSTEM_SANS).is_file() {
            eprintln!("skipping: {} not installed", SYSTEM_SANS);
            return;
        }

        let fonts = ReportFonts::resolve(SYSTEM_SANS).unwrap();
        let FontFace::Embedded(regular) = &fonts.regular else {
            panic!("expected an embedded font, got {:?}", fonts.regular);
        };
        assert_eq!(regular.name, "DejaVuSans");
        let title_file = if Path::new(SYSTEM_SANS_BOLD).is_file() {
            let FontFace::Embedded(bold) = &fonts.bold else {
                panic!("expected an embedded bold font, got {:?}", fonts.bold);
            };
            assert_eq!(bold.name, "DejaVuSans-Bold");
            SYSTEM_SANS_BOLD
        } else {
            SYSTEM_SANS
        };

        let tasks = vec![task("A1", 1, 1)];
        let history: Vec<Assessment> = Vec::new();
        let latest = latest_assessment_by_skill(&history);
        let map = build_skills_map(&tasks, &latest);
        let sections = section_progress(&tasks, &latest);
        let input = single_task_input("Иван Петров", &map, &sections);

        let bytes = render_report(&input, &fonts).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);

        let data = std::fs::read(title_file).unwrap();
        let face = ttf_parser::Face::parse(&data, 0).unwrap();
        let expected: Vec<u8> = "ABLLS-R skills map: Иван Петров"
            .chars()
            .flat_map(|c| face.glyph_index(c).unwrap().0.to_be_bytes())
            .collect();
        assert!(shown_strings(&doc, 1).contains(&expected));

        let type0 = type0_fonts(&doc);
        assert!(!type0.is_empty());
        for font in type0 {
            assert_eq!(font.get(b"Encoding").unwrap().as_name().unwrap(), b"Identity-H");

            let cmap_id = font.get(b"ToUnicode").unwrap().as_reference().unwrap();
            let cmap = doc
                .get_object(cmap_id)
                .unwrap()
                .as_stream()
                .unwrap()
                .decompressed_content()
                .unwrap();
            let cmap = String::from_utf8(cmap).unwrap();
            assert!(cmap.contains("begincmap"));

            let descendants = font.get(b"DescendantFonts").unwrap().as_array().unwrap();
            let cid_id = descendants[0].as_reference().unwrap();
            let cid = doc.get_dictionary(cid_id).unwrap();
            assert_eq!(cid.get(b"Subtype").unwrap().as_name().unwrap(), b"CIDFontType2");
        }

        let regular_cmap = doc
            .objects
            .values()
            .filter_map(|object| object.as_stream().ok())
            .filter_map(|stream| stream.decompressed_content().ok())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .find(|text| text.contains("<0418>"));
        assert!(regular_cmap.is_some(), "no ToUnicode entry for И");
    }

    #[test]
    fn unusable_font_files_fall_back_to_helvetica() {
        let missing = "/nonexistent/fonts/Nowhere.ttf";
        assert!(ReportFonts::resolve(missing).is_err());
        assert_eq!(ReportFonts::load(Some(missing)), ReportFonts::default());

        let dir = tempfile::tempdir().unwrap();
        let junk = dir.path().join("Broken.otf");
        std::fs::File::create(&junk)
            .unwrap()
            .write_all(b"definitely not a font")
            .unwrap();
        let junk = junk.to_str().unwrap();
        assert!(ReportFonts::resolve(junk).is_err());
        assert_eq!(ReportFonts::load(Some(junk)), ReportFonts::default());
    }

    #[test]
    fn cmap_maps_glyphs_back_to_utf16() {
        let mut used = BTreeMap::new();
        used.insert(0x0123_u16, 'И');
        used.insert(0x0044_u16, 'A');
        used.insert(0x0500_u16, '😀');

        let cmap = String::from_utf8(to_unicode_cmap(&used)).unwrap();
        assert!(cmap.contains("3 beginbfchar"));
        assert!(cmap.contains("<0044> <0041>"));
        assert!(cmap.contains("<0123> <0418>"));
        assert!(cmap.contains("<0500> <D83DDE00>"));
        assert!(cmap.trim_end().ends_with("end"));
    }
}
