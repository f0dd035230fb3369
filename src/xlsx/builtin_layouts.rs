use crate::common::errors::AppError;
use crate::xlsx::layout::{
    AnchorSelector, FieldSlot, ItemBlock, ItemColumn, RowAnchor, ShapeGroup, ShapeValue,
    TemplateLayout,
};
use crate::xlsx::sheet_ref::SheetRef;

pub const BUILTIN_LAYOUT_NAMES: [&str; 6] =
    ["recepcion", "compresion", "verificacion", "humedad", "cbr", "informe"];

pub struct BuiltinLayouts;

impl BuiltinLayouts {
    pub fn get(name: &str) -> Result<TemplateLayout, AppError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "recepcion" => Ok(Self::recepcion()),
            "compresion" => Ok(Self::compresion()),
            "verificacion" => Ok(Self::verificacion()),
            "humedad" => Ok(Self::humedad()),
            "cbr" => Ok(Self::cbr()),
            "informe" => Ok(Self::informe()),
            _ => Err(AppError::LayoutNotFound(format!(
                "{name} (known: {})",
                BUILTIN_LAYOUT_NAMES.join(", ")
            ))),
        }
    }

    pub fn all() -> Vec<TemplateLayout> {
        vec![
            Self::recepcion(),
            Self::compresion(),
            Self::verificacion(),
            Self::humedad(),
            Self::cbr(),
            Self::informe(),
        ]
    }

    fn base(name: &str, template: &str) -> TemplateLayout {
        TemplateLayout {
            name: name.to_string(),
            template: template.to_string(),
            sheet: SheetRef::default(),
            item_block: None,
            header: Vec::new(),
            footer: Vec::new(),
            shapes: Vec::new(),
            clear_cells: Vec::new(),
            shape_values: Vec::new(),
            remove_anchors: Vec::new(),
        }
    }

    fn signature_shapes() -> Vec<ShapeGroup> {
        vec![
            ShapeGroup::new(
                "Revisado:",
                &[("Revisado:", "revisado_por"), ("Fecha:", "revisado_fecha")],
            ),
            ShapeGroup::new(
                "Aprobado:",
                &[("Aprobado:", "aprobado_por"), ("Fecha:", "aprobado_fecha")],
            ),
        ]
    }

    // Sample reception: 18 authored rows two below the "N°" header; footer
    // slots hang off the "NOTA:" label.
    fn recepcion() -> TemplateLayout {
        let mut layout = Self::base("recepcion", "Temp_Recepcion.xlsx");
        layout.item_block = Some(ItemBlock {
            first_row: 23,
            capacity: 18,
            source_row: Some(24),
            drawing_pivot_row: Some(43),
            first_row_label: Some(RowAnchor {
                label: "N°".to_string(),
                row_offset: 2,
            }),
            min_items: 0,
            columns: vec![
                ItemColumn::sequence("A"),
                ItemColumn::field("B", "codigo_muestra_lem"),
                ItemColumn::field("D", "identificacion_muestra"),
                ItemColumn::field("E", "estructura"),
                ItemColumn::field("F", "fc_kg_cm2").number(),
                ItemColumn::field("G", "fecha_moldeo"),
                ItemColumn::field("H", "hora_moldeo"),
                ItemColumn::field("I", "edad").number(),
                ItemColumn::field("J", "fecha_rotura"),
                ItemColumn::field("K", "requiere_densidad").boolean("SI", "NO"),
            ],
        });
        layout.header = vec![
            FieldSlot::beside("numero_recepcion", "RECEPCIÓN N°:", 3, 0).or_at("D6"),
            FieldSlot::beside("numero_cotizacion", "COTIZACIÓN N°:", 3, 0),
            FieldSlot::beside("fecha_recepcion", "FECHA DE RECEPCIÓN:", 1, 0),
            FieldSlot::beside("numero_ot", "OT N°:", 1, 0),
            FieldSlot::beside("cliente", "CLIENTE :", 1, 0).or_at("D10"),
            FieldSlot::beside("domicilio_legal", "DOMICILIO LEGAL :", 1, 0).or_at("D11"),
            FieldSlot::beside("ruc", "RUC :", 1, 0).or_at("D12"),
            FieldSlot::beside("persona_contacto", "PERSONA CONTACTO :", 1, 0).or_at("D13"),
            FieldSlot::beside("email", "E-MAIL :", 1, 0).or_at("D14"),
            FieldSlot::beside("telefono", "TELÉFONO :", 1, 0).or_at("H14"),
            FieldSlot::beside("solicitante", "SOLICITANTE :", 1, 0).or_at("D16"),
            FieldSlot::beside("domicilio_solicitante", "SOLICITANTE :", 1, 1).or_at("D17"),
            FieldSlot::beside("proyecto", "PROYECTO :", 1, 0).or_at("D18"),
            FieldSlot::beside("ubicacion", "UBICACIÓN :", 1, 0).or_at("D19"),
        ];
        layout.footer = vec![
            FieldSlot::beside("observaciones", "NOTA:", 2, 0).or_at("D43"),
            FieldSlot::beside("emision_fisica", "NOTA:", 0, 3)
                .or_at("B46")
                .boolean("X", ""),
            FieldSlot::beside("emision_digital", "NOTA:", 0, 4)
                .or_at("B47")
                .boolean("X", ""),
            FieldSlot::beside("fecha_estimada_culminacion", "NOTA:", 6, 3).or_at("H46"),
            FieldSlot::beside("entregado_por", "NOTA:", 2, 6).or_at("D49"),
            FieldSlot::beside("recibido_por", "NOTA:", 7, 6).or_at("I49"),
        ];
        layout
    }

    fn compresion() -> TemplateLayout {
        let mut layout = Self::base("compresion", "Template_Compresion.xlsx");
        layout.item_block = Some(ItemBlock {
            first_row: 16,
            capacity: 18,
            source_row: None,
            drawing_pivot_row: None,
            first_row_label: None,
            min_items: 0,
            columns: vec![
                ItemColumn::field("B", "item").number(),
                ItemColumn::field("C", "codigo_lem"),
                ItemColumn::field("D", "fecha_ensayo_programado"),
                ItemColumn::field("E", "hora_ensayo"),
                ItemColumn::field("F", "carga_maxima").number(),
                ItemColumn::field("G", "tipo_fractura"),
                ItemColumn::field("H", "defectos"),
                ItemColumn::field("I", "realizado"),
                ItemColumn::field("J", "fecha_ensayo"),
                ItemColumn::field("K", "revisado"),
                ItemColumn::field("L", "fecha_revisado"),
                ItemColumn::field("M", "aprobado"),
                ItemColumn::field("N", "fecha_aprobado"),
            ],
        });
        layout.footer = vec![
            FieldSlot::at("codigo_equipo", "E35"),
            FieldSlot::at("otros", "I35"),
            FieldSlot::at("nota", "D37"),
        ];
        layout.clear_cells = vec!["P34".to_string()];
        // Both numbers live in text boxes above the item table.
        layout.shape_values = vec![
            ShapeValue::at("recepcion_numero", AnchorSelector::FromCell("E10".to_string()))
                .aligned("ctr"),
            ShapeValue::at("ot_numero", AnchorSelector::FromCell("G10".to_string())).aligned("r"),
        ];
        layout.remove_anchors = vec![AnchorSelector::FromRowAtLeast(39)];
        layout
    }

    fn verificacion() -> TemplateLayout {
        let mut layout = Self::base("verificacion", "Template_Verificacion.xlsx");
        let fields = [
            ("B", "codigo_lem"),
            ("C", "tipo_testigo"),
            ("D", "diametro_1_mm"),
            ("E", "diametro_2_mm"),
            ("F", "tolerancia_porcentaje"),
            ("G", "aceptacion_diametro"),
            ("H", "perpendicularidad_sup1"),
            ("I", "perpendicularidad_sup2"),
            ("J", "perpendicularidad_inf1"),
            ("K", "perpendicularidad_inf2"),
            ("L", "perpendicularidad_medida"),
            ("M", "planitud_superior"),
            ("N", "planitud_inferior"),
            ("O", "planitud_depresiones"),
            ("P", "accion_realizar"),
            ("Q", "conformidad"),
            ("R", "longitud_1_mm"),
            ("S", "longitud_2_mm"),
            ("T", "longitud_3_mm"),
            ("U", "masa_muestra_aire_g"),
            ("V", "pesar"),
        ];
        let numeric = ["D", "E", "F", "R", "S", "T", "U"];
        let checks = ["G", "H", "I", "J", "K", "L", "M", "N", "O"];

        let mut columns = vec![ItemColumn::sequence("A")];
        for (col, field) in fields {
            let column = ItemColumn::field(col, field);
            columns.push(if numeric.contains(&col) {
                column.number()
            } else if checks.contains(&col) {
                column.boolean("CUMPLE", "NO CUMPLE")
            } else {
                column
            });
        }
        layout.item_block = Some(ItemBlock {
            first_row: 10,
            capacity: 8,
            source_row: None,
            drawing_pivot_row: None,
            first_row_label: None,
            min_items: 0,
            columns,
        });
        layout.header = vec![
            FieldSlot::beside("verificado_por", "VERIFICADO POR:", 3, 0),
            FieldSlot::beside("fecha_verificacion", "FECHA VERIFIC.:", 1, 0),
            FieldSlot::beside("cliente", "CLIENTE:", 1, 0),
        ];
        layout.footer = vec![
            FieldSlot::at("equipo_bernier", "D18"),
            FieldSlot::at("equipo_lainas_1", "F18"),
            FieldSlot::at("equipo_lainas_2", "H18"),
            FieldSlot::at("equipo_escuadra", "J18"),
            FieldSlot::at("equipo_balanza", "L18"),
            FieldSlot::at("nota", "B19"),
        ];
        layout
    }

    // No item block: every value sits in a fixed cell.
    fn humedad() -> TemplateLayout {
        let mut layout = Self::base("humedad", "Template_Humedad.xlsx");
        let mut header = vec![
            FieldSlot::at("muestra", "D12").style_from("E10"),
            FieldSlot::at("numero_ot", "E12").style_from("E10"),
            FieldSlot::at("fecha_ensayo", "G12").style_from("E10"),
            FieldSlot::at("realizado_por", "I12").style_from("E10"),
            FieldSlot::at("condicion_masa_menor", "J18"),
            FieldSlot::at("condicion_capas", "J19"),
            FieldSlot::at("condicion_temperatura", "J20"),
            FieldSlot::at("condicion_excluido", "J21"),
            FieldSlot::at("descripcion_material_excluido", "A22").inline(),
            FieldSlot::at("tipo_muestra", "E25"),
            FieldSlot::at("condicion_muestra", "E26"),
            FieldSlot::at("tamano_maximo_particula", "E27"),
            FieldSlot::at("metodo_a", "J26").boolean("X", ""),
            FieldSlot::at("metodo_b", "J27").boolean("X", ""),
            FieldSlot::at("numero_ensayo", "I31").number(),
            FieldSlot::at("recipiente_numero", "I32").style_from("I37"),
            FieldSlot::at("masa_recipiente_muestra_humeda", "I33").number().style_from("I37"),
            FieldSlot::at("masa_recipiente_muestra_seca", "I34").number().style_from("I37"),
            FieldSlot::at("masa_recipiente_muestra_seca_constante", "I35")
                .number()
                .style_from("I37"),
            FieldSlot::at("masa_recipiente", "I36").number().style_from("I37"),
            FieldSlot::at("masa_agua", "I37").number(),
            FieldSlot::at("masa_muestra_seca", "I38").number().style_from("I37"),
            FieldSlot::at("contenido_humedad", "I39").number().style_from("I37"),
        ];
        for (method, first_row) in [("metodo_a", 43u32), ("metodo_b", 47u32)] {
            for n in 0..3u32 {
                let row = first_row + n;
                header.push(FieldSlot::at(&format!("{method}_tamano_{}", n + 1), &format!("B{row}")));
                header.push(FieldSlot::at(&format!("{method}_masa_{}", n + 1), &format!("E{row}")));
                header.push(FieldSlot::at(
                    &format!("{method}_legibilidad_{}", n + 1),
                    &format!("F{row}"),
                ));
            }
        }
        header.extend([
            FieldSlot::at("equipo_balanza_01", "J42"),
            FieldSlot::at("equipo_balanza_001", "J43"),
            FieldSlot::at("equipo_horno", "J45"),
        ]);
        layout.header = header;
        layout.footer = vec![FieldSlot::at("observaciones", "D52")];
        layout.shapes = Self::signature_shapes();
        layout
    }

    // Penetration readings fill rows 40..=51; swell readings share the first
    // six of those rows, so they ride along as extra item columns.
    fn cbr() -> TemplateLayout {
        let mut layout = Self::base("cbr", "Temp_CBR_ASTM.xlsx");
        layout.item_block = Some(ItemBlock {
            first_row: 40,
            capacity: 12,
            source_row: None,
            drawing_pivot_row: None,
            first_row_label: None,
            min_items: 0,
            columns: vec![
                ItemColumn::field("D", "tension_standard").number(),
                ItemColumn::field("E", "lectura_dial_esp_01").number(),
                ItemColumn::field("G", "lectura_dial_esp_02").number(),
                ItemColumn::field("I", "lectura_dial_esp_03").number(),
                ItemColumn::field("L", "hinchamiento_fecha"),
                ItemColumn::field("N", "hinchamiento_hora"),
                ItemColumn::field("O", "hinchamiento_esp_01").number(),
                ItemColumn::field("P", "hinchamiento_esp_02").number(),
                ItemColumn::field("Q", "hinchamiento_esp_03").number(),
            ],
        });

        let mut header = vec![
            FieldSlot::at("muestra", "D9"),
            FieldSlot::at("numero_ot", "F9"),
            FieldSlot::at("fecha_ensayo", "I9"),
            FieldSlot::at("realizado_por", "L9"),
            FieldSlot::at("sobretamano_porcentaje", "E14").number(),
            FieldSlot::at("masa_grava_adicionada_g", "E15").number(),
            FieldSlot::at("condicion_muestra_saturado", "E16"),
            FieldSlot::at("condicion_muestra_sin_saturar", "E17"),
            FieldSlot::at("maxima_densidad_seca", "O14").number(),
            FieldSlot::at("optimo_contenido_humedad", "O15").number(),
            FieldSlot::at("temperatura_inicial_c", "O16").number(),
            FieldSlot::at("temperatura_final_c", "O17").number(),
            FieldSlot::at("tamano_maximo_visual_in", "G19"),
            FieldSlot::at("descripcion_muestra_astm", "E20"),
        ];
        for (idx, col) in ["D", "H", "L"].iter().enumerate() {
            let n = idx + 1;
            header.push(FieldSlot::at(&format!("golpes_esp_{n}"), &format!("{col}23")).number());
            header.push(FieldSlot::at(&format!("codigo_molde_esp_{n}"), &format!("{col}24")));
        }
        // Row 32 holds template formulas and is never written.
        let per_column: [(u32, &str, bool); 7] = [
            (25, "temperatura_inicio_c", true),
            (26, "temperatura_final_c", true),
            (27, "masa_molde_suelo_g", true),
            (29, "codigo_tara", false),
            (30, "masa_tara_g", true),
            (31, "masa_suelo_humedo_tara_g", true),
            (33, "masa_suelo_seco_tara_g", true),
        ];
        for (idx, col) in ["D", "F", "H", "J", "L", "O"].iter().enumerate() {
            let n = idx + 1;
            for (row, prefix, numeric) in per_column {
                let slot = FieldSlot::at(&format!("{prefix}_{n}"), &format!("{col}{row}"));
                header.push(if numeric { slot.number() } else { slot });
            }
            header.push(
                FieldSlot::at(
                    &format!("masa_suelo_seco_tara_constante_g_{n}"),
                    &format!("{col}34"),
                )
                .number(),
            );
        }
        layout.header = header;
        layout.footer = vec![
            FieldSlot::at("profundidad_hendidura_mm", "D53").number(),
            FieldSlot::at("equipo_cbr", "O47"),
            FieldSlot::at("equipo_dial_deformacion", "O48"),
            FieldSlot::at("equipo_dial_expansion", "O49"),
            FieldSlot::at("equipo_horno_110", "O50"),
            FieldSlot::at("equipo_pison", "O51"),
            FieldSlot::at("equipo_balanza_1g", "O52"),
            FieldSlot::at("equipo_balanza_01g", "O53"),
            FieldSlot::at("observaciones", "D56"),
        ];
        layout.shapes = Self::signature_shapes();
        layout
    }

    // Cross-module summary: three pre-formatted rows from row 16.
    fn informe() -> TemplateLayout {
        let mut layout = Self::base("informe", "Template_Informe.xlsx");
        layout.item_block = Some(ItemBlock {
            first_row: 16,
            capacity: 3,
            source_row: None,
            drawing_pivot_row: None,
            first_row_label: None,
            min_items: 0,
            columns: vec![
                ItemColumn::field("A", "codigo_lem"),
                ItemColumn::field("B", "codigo_cliente"),
                ItemColumn::field("C", "diametro_1").number(),
                ItemColumn::field("D", "diametro_2").number(),
                ItemColumn::field("E", "longitud_1").number(),
                ItemColumn::field("F", "longitud_2").number(),
                ItemColumn::field("G", "longitud_3").number(),
                ItemColumn::field("H", "carga_maxima").number(),
                ItemColumn::field("I", "tipo_fractura"),
                ItemColumn::field("J", "masa_muestra_aire").number(),
            ],
        });
        layout.header = vec![
            FieldSlot::at("cliente", "B5"),
            FieldSlot::at("direccion", "B6"),
            FieldSlot::at("proyecto", "B7"),
            FieldSlot::at("ubicacion", "B8"),
            FieldSlot::at("recepcion_numero", "J5"),
            FieldSlot::at("ot_numero", "J6"),
            FieldSlot::at("estructura", "B10"),
            FieldSlot::at("fc_kg_cm2", "B11"),
            FieldSlot::at("fecha_recepcion", "J9"),
            FieldSlot::at("fecha_moldeo", "J10"),
            FieldSlot::at("fecha_ensayo_programado", "J11"),
            FieldSlot::at("densidad", "J13").boolean("Sí", "No"),
        ];
        layout.footer = vec![
            FieldSlot::at("realizado_por", "A21"),
            FieldSlot::at("fecha_ensayo", "D21"),
            FieldSlot::at("revisado_por", "H21"),
        ];
        layout
    }
}
