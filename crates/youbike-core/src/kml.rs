//! KML documents for station chunks and the network-link overview.

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use youbike_parser::{StationRecord, StationType};

use crate::error::{PipelineError, Result};

pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";
pub const OVERVIEW_NAME: &str = "YouBike 站點地圖";
pub const OVERVIEW_DESCRIPTION: &str = "台灣 YouBike 站點地圖，資料來自開放資料。";
const ICON_SCALE: &str = "0.5";

/// Whether placemarks reference the per-type icon styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleMode {
    Icons,
    Plain,
}

pub fn style_id(station_type: StationType) -> &'static str {
    match station_type {
        StationType::YouBike1 => "icon-yb1",
        StationType::YouBike2 => "icon-yb2",
    }
}

pub fn icon_href(station_type: StationType) -> &'static str {
    match station_type {
        StationType::YouBike1 => "https://i.imgur.com/WcdI4Nt.png",
        StationType::YouBike2 => "https://i.imgur.com/cvcGgeu.png",
    }
}

pub fn description(station: &StationRecord) -> String {
    format!(
        "地址: {}{}{}\n車位: {}",
        station.city, station.area, station.address, station.space
    )
}

/// `lon,lat,0`, both already at six-decimal precision.
pub fn coordinates(station: &StationRecord) -> String {
    format!("{},{},0", station.longitude, station.latitude)
}

/// Serializes one chunk of stations as a compact (single line) KML document.
pub fn stations_to_kml(title: &str, stations: &[StationRecord], styles: StyleMode) -> Result<String> {
    let mut kml = KmlWriter::compact();
    kml.declaration()?;
    kml.open_root()?;
    kml.open("Document")?;
    kml.text_element("name", title)?;

    if styles == StyleMode::Icons {
        for station_type in StationType::ALL {
            kml.event(Event::Start(
                BytesStart::new("Style").with_attributes([("id", style_id(station_type))]),
            ))?;
            kml.open("IconStyle")?;
            kml.text_element("scale", ICON_SCALE)?;
            kml.open("Icon")?;
            kml.text_element("href", icon_href(station_type))?;
            kml.close("Icon")?;
            kml.close("IconStyle")?;
            kml.close("Style")?;
        }
    }

    for station in stations {
        kml.open("Placemark")?;
        kml.text_element("name", &station.name)?;
        kml.text_element("description", &description(station))?;
        if styles == StyleMode::Icons {
            kml.text_element("styleUrl", &format!("#{}", style_id(station.station_type)))?;
        }
        kml.open("Point")?;
        kml.text_element("coordinates", &coordinates(station))?;
        kml.close("Point")?;
        kml.close("Placemark")?;
    }

    kml.close("Document")?;
    kml.close("kml")?;
    kml.finish()
}

/// Pretty-printed overview document linking every published chunk, named
/// `YouBike 1`, `YouBike 2`, ... in list order.
pub fn network_links_to_kml(links: &[String]) -> Result<String> {
    let mut kml = KmlWriter::pretty();
    kml.declaration()?;
    kml.open_root()?;
    kml.open("Document")?;
    kml.text_element("name", OVERVIEW_NAME)?;
    kml.text_element("description", OVERVIEW_DESCRIPTION)?;

    for (index, href) in links.iter().enumerate() {
        kml.open("NetworkLink")?;
        kml.text_element("name", &format!("YouBike {}", index + 1))?;
        kml.open("Link")?;
        kml.text_element("href", href)?;
        kml.close("Link")?;
        kml.close("NetworkLink")?;
    }

    kml.close("Document")?;
    kml.close("kml")?;
    kml.finish()
}

struct KmlWriter {
    inner: Writer<Vec<u8>>,
}

impl KmlWriter {
    fn compact() -> Self {
        Self {
            inner: Writer::new(Vec::new()),
        }
    }

    fn pretty() -> Self {
        Self {
            inner: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.inner
            .write_event(event)
            .map_err(|err| PipelineError::Convert(err.to_string()))
    }

    fn declaration(&mut self) -> Result<()> {
        self.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    fn open_root(&mut self) -> Result<()> {
        self.event(Event::Start(
            BytesStart::new("kml").with_attributes([("xmlns", KML_NAMESPACE)]),
        ))
    }

    fn open(&mut self, name: &str) -> Result<()> {
        self.event(Event::Start(BytesStart::new(name)))
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    // Only `&`, `<` and `>` are escaped in text content.
    fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.open(name)?;
        self.event(Event::Text(BytesText::from_escaped(partial_escape(text))))?;
        self.close(name)
    }

    fn finish(self) -> Result<String> {
        String::from_utf8(self.inner.into_inner())
            .map_err(|err| PipelineError::Convert(err.to_string()))
    }
}
